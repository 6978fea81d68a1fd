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

//! [`Notifier`](crate::notifier::Notifier) configuration.
//!
//! [`Config`] derives [`serde::Deserialize`] so that applications can embed it in their own
//! configuration files; every field is optional:
//!
//! ```rust
//! use gelf_notifier::config::Config;
//! use gelf_notifier::chunker::MaxChunkSize;
//! use gelf_notifier::level::Level;
//!
//! let config: Config = serde_json::from_str(
//!     r#"{"host": "graylog.local", "max_chunk_size": "LAN", "level": "warn",
//!         "defaults": {"facility": "billing"}}"#,
//! )
//! .unwrap();
//! assert_eq!(config.port, 12201);
//! assert_eq!(config.max_chunk_size, MaxChunkSize::Lan);
//! assert_eq!(config.level, Level::Warn);
//! ```

use crate::{chunker::MaxChunkSize, event::Fields, level::Level, transport::DEFAULT_PORT};

use serde::{Deserialize, Serialize};

/// Notifier configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collector host name or address
    pub host: String,
    /// Collector port
    pub port: u16,
    /// Largest payload sent in a single datagram
    pub max_chunk_size: MaxChunkSize,
    /// Minimum level to send; anything less severe is dropped
    pub level: Level,
    /// Fields to send with every message; `version`, `host`, `level` & `facility` are filled-in
    /// if absent
    pub defaults: Fields,
}

impl std::default::Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            max_chunk_size: MaxChunkSize::default(),
            level: Level::Debug,
            defaults: Fields::new(),
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 12201);
        assert_eq!(config.max_chunk_size, MaxChunkSize::Wan);
        assert_eq!(config.level, Level::Debug);
        assert!(config.defaults.is_empty());
    }

    #[test]
    fn numeric_chunk_size() {
        let config: Config = serde_json::from_str(r#"{"max_chunk_size": 500}"#).unwrap();
        assert_eq!(config.max_chunk_size.bytes(), 500);
        assert!(serde_json::from_str::<Config>(r#"{"max_chunk_size": "jumbo"}"#).is_err());
    }

    #[test]
    fn level_spellings() {
        let config: Config = serde_json::from_str(r#"{"level": "WARNING"}"#).unwrap();
        assert_eq!(config.level, Level::Warn);
        let config: Config = serde_json::from_str(r#"{"level": 3}"#).unwrap();
        assert_eq!(config.level, Level::Error);
    }
}
