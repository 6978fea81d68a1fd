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
//! Send [GELF] messages to [Graylog] (or any other GELF collector) over UDP
//!
//! [GELF]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html
//! [Graylog]: https://graylog.org/
//!
//! # Introduction
//!
//! The Graylog Extended Log Format is a structured log record: a flat JSON object with a handful
//! of mandatory fields (`version`, `host` & `short_message`), a few well-known optional ones
//! (`full_message`, `level`, `timestamp`, `file`, `line`, `facility`) and as many application
//! fields as you care to add. Over UDP, each record is zlib-compressed &, if it won't fit in a
//! single datagram, split into numbered "chunks" that the collector reassembles.
//!
//! This crate is the producer side of that protocol. It does not attempt reliable delivery: UDP
//! is fire-and-forget, & so is a [`Notifier`].
//!
//! [`Notifier`]: crate::notifier::Notifier
//!
//! # Usage
//!
//! A [`Notifier`] with the default configuration sends to port 12201 on localhost:
//!
//! ```no_run
//! use gelf_notifier::{event::Fields, notifier::Notifier};
//!
//! let notifier = Notifier::try_default().unwrap();
//!
//! // A plain message...
//! notifier.notify("Hello, world!", Fields::new()).unwrap();
//!
//! // a message with extra fields...
//! let mut extra = Fields::new();
//! extra.insert("user".to_string(), "alice".into());
//! notifier.notify("User logged in", extra).unwrap();
//! ```
//!
//! The collector, chunk size, minimum level & default fields are all configurable:
//!
//! ```no_run
//! use gelf_notifier::{
//!     event::{Exception, Fields},
//!     level::Level,
//!     notifier::Notifier,
//! };
//!
//! let notifier = Notifier::builder()
//!     .host("graylog.domain.io")
//!     .port(12201)
//!     .max_chunk_size_as_string("LAN")
//!     .unwrap()
//!     .level(Level::Info)
//!     .default_field("facility", "billing")
//!     .build()
//!     .unwrap();
//!
//! notifier
//!     .notify(Exception::new("SecurityError", "ALARM!"), Fields::new())
//!     .unwrap();
//! ```
//!
//! # Failure
//!
//! [`Notifier::notify`] & [`Notifier::notify_with_level`] try hard not to bother their caller: if
//! a message can't be built or sent, they make one attempt to send a message describing _that_
//! failure instead. [`Notifier::notify_strict`] & [`Notifier::notify_with_level_strict`] return
//! every failure to the caller.
//!
//! [`Notifier::notify`]: crate::notifier::Notifier::notify
//! [`Notifier::notify_with_level`]: crate::notifier::Notifier::notify_with_level
//! [`Notifier::notify_strict`]: crate::notifier::Notifier::notify_strict
//! [`Notifier::notify_with_level_strict`]: crate::notifier::Notifier::notify_with_level_strict

pub mod chunker;
pub mod config;
pub mod encoder;
pub mod error;
pub mod event;
pub mod level;
pub mod notifier;
pub mod transport;
