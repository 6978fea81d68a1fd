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

//! GELF payload encoding: JSON, then zlib.

use crate::{
    error::{Error, Result},
    event::Event,
};

use backtrace::Backtrace;
use flate2::{write::ZlibEncoder, Compression};

use std::io::Write;

/// Serialize & compress `event`.
///
/// The outgoing copy has its `level` rewritten from the application [`Level`] to the matching
/// syslog severity; `event` itself is untouched. An event with no `level` is sent without one.
///
/// [`Level`]: crate::level::Level
pub fn encode(event: &Event) -> Result<Vec<u8>> {
    if event.is_empty() {
        return Err(Error::EmptyPayload {
            back: Backtrace::new(),
        });
    }

    let mut fields = event.fields().clone();
    if let Some(level) = event.level()? {
        fields.insert("level".to_string(), (level.to_syslog() as u8).into());
    }

    let json = serde_json::to_vec(&fields).map_err(|err| Error::Serialize {
        source: err,
        back: Backtrace::new(),
    })?;

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder
        .write_all(&json)
        .and_then(|_| encoder.finish())
        .map_err(|err| Error::Compress {
            source: err,
            back: Backtrace::new(),
        })
}
