// Copyright (C) 2022 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-notifier.
//
// gelf-notifier is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// gelf-notifier is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with gelf-notifier.  If
// not, see <http://www.gnu.org/licenses/>.

//! Test writing to port 12201 on the local host.

use gelf_notifier::{
    event::{Exception, Fields},
    level::Level,
    notifier::Notifier,
};

use serde_json::json;

pub fn main() {
    // Let the notifier's own diagnostics through...
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // then build the notifier.
    let notifier = Notifier::builder()
        .default_field("facility", "gelf-test")
        .build()
        .unwrap();

    for level in Level::ALL {
        notifier
            .notify_with_level(level, format!("Hello, 世界! ({})", level), Fields::new())
            .unwrap();
    }

    let mut extra = Fields::new();
    extra.insert("_user".to_string(), json!("alice"));
    extra.insert("_attempt".to_string(), json!(3));
    notifier.notify("User logged in", extra).unwrap();

    notifier
        .notify(
            Exception::new("SecurityError", "ALARM!").with_backtrace(vec![
                "udp-test.rs:51:in `main'".to_string(),
            ]),
            Fields::new(),
        )
        .unwrap();

    // Big enough to need a few WAN-sized chunks
    let long: String = (0..20_000u32)
        .map(|i| char::from(b'a' + ((i * 7919 + i / 13) % 26) as u8))
        .collect();
    let mut extra = Fields::new();
    extra.insert("full_message".to_string(), json!(long));
    notifier
        .notify_strict("A long message, sent in chunks", extra)
        .unwrap();
}
