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

//! Application levels, syslog severities & the table mapping one to the other.
//!
//! Callers speak in terms of [`Level`], the six levels of a conventional application logger.
//! Graylog, however, expects the `level` field of a GELF message to hold a syslog severity, as
//! defined in RFC [5424] (and modelled here by [`SyslogLevel`]). The translation happens at encode
//! time, through [`syslog_severity`].
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424

use crate::error::{Error, Result};

use backtrace::Backtrace;
use serde::{Deserialize, Serialize};

type StdResult<T, E> = std::result::Result<T, E>;

/// Application log levels
///
/// The discriminants follow the usual application-logger convention, in which larger numbers are
/// _more_ severe. `Unknown` is the level of messages that should always be logged; it is the
/// default level of an event that specifies none.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "LevelRepr")]
pub enum Level {
    /// low-level information for developers
    Debug = 0,
    /// generally useful information
    Info = 1,
    /// a warning
    Warn = 2,
    /// a handleable error condition
    Error = 3,
    /// an unhandleable error that results in a program crash
    Fatal = 4,
    /// an unknown message that should always be logged
    Unknown = 5,
}

impl Level {
    /// Every level, least severe first
    pub const ALL: [Level; 6] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
        Level::Unknown,
    ];

    /// The lower-case name of this level
    pub fn name(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Unknown => "unknown",
        }
    }

    /// The syslog severity Graylog expects for this level; see [`syslog_severity`].
    pub fn to_syslog(self) -> SyslogLevel {
        syslog_severity(self)
    }

    /// True if `self` is less severe than `other`
    pub fn is_less_severe_than(self, other: Level) -> bool {
        (self as u8) < (other as u8)
    }

    /// Read a level out of a GELF field: either a level number or a level name.
    ///
    /// Only application levels are understood: an integer in 0..=5, or a name as accepted by
    /// [`FromStr`](std::str::FromStr). Syslog severities (6 & 7 in particular) and non-integral
    /// numbers such as `3.0` are refused with [`Error::InvalidLevel`].
    pub fn from_value(value: &serde_json::Value) -> Result<Level> {
        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .and_then(|n| Level::try_from(n).ok())
                .ok_or_else(|| Error::InvalidLevel {
                    value: n.to_string(),
                    back: Backtrace::new(),
                }),
            serde_json::Value::String(s) => s.parse::<Level>(),
            other => Err(Error::InvalidLevel {
                value: other.to_string(),
                back: Backtrace::new(),
            }),
        }
    }
}

impl std::default::Default for Level {
    /// The default level is `Unknown`.
    fn default() -> Self {
        Level::Unknown
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Level {
    type Err = Error;
    /// Level names are matched case-insensitively; "warning" is accepted for `Warn`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            "unknown" => Ok(Level::Unknown),
            _ => Err(Error::InvalidLevel {
                value: s.to_string(),
                back: Backtrace::new(),
            }),
        }
    }
}

impl std::convert::TryFrom<u8> for Level {
    type Error = Error;
    fn try_from(x: u8) -> Result<Self> {
        Level::ALL
            .get(x as usize)
            .copied()
            .ok_or_else(|| Error::InvalidLevel {
                value: x.to_string(),
                back: Backtrace::new(),
            })
    }
}

/// How a [`Level`] appears in configuration: a level number or a name.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum LevelRepr {
    Number(u8),
    Name(String),
}

impl std::convert::TryFrom<LevelRepr> for Level {
    type Error = Error;
    fn try_from(repr: LevelRepr) -> Result<Self> {
        match repr {
            LevelRepr::Number(n) => Level::try_from(n),
            LevelRepr::Name(s) => s.parse(),
        }
    }
}

impl std::convert::From<Level> for serde_json::Value {
    /// Levels travel through an event as their application number
    fn from(level: Level) -> Self {
        serde_json::Value::from(level as u8)
    }
}

/// RFC [5424] defines eight severity levels for messages. The enumeration values duplicate the
/// constants documented as per the `syslog()` manual [page] & defined in `<syslog.h>`.
///
/// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
/// [page]: https://man7.org/linux/man-pages/man3/syslog.3.html
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyslogLevel {
    /// system is unusable
    Emergency = 0,
    /// action must be take immediately
    Alert = 1,
    /// critical conditions
    Critical = 2,
    /// error conditions
    Error = 3,
    /// warning conditions
    Warning = 4,
    /// normal, but significant condition
    Notice = 5,
    /// informational message
    Informational = 6,
    /// debug-level message
    Debug = 7,
}

impl std::fmt::Display for SyslogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                SyslogLevel::Emergency => "LOG_EMERG",
                SyslogLevel::Alert => "LOG_ALERT",
                SyslogLevel::Critical => "LOG_CRIT",
                SyslogLevel::Error => "LOG_ERR",
                SyslogLevel::Warning => "LOG_WARNING",
                SyslogLevel::Notice => "LOG_NOTICE",
                SyslogLevel::Informational => "LOG_INFO",
                SyslogLevel::Debug => "LOG_DEBUG",
            }
        )
    }
}

/// Map an application [`Level`] to the syslog severity sent on the wire.
///
/// No level maps to a syslog value equal to its own discriminant, so an untranslated level can't
/// masquerade as a translated one.
pub fn syslog_severity(level: Level) -> SyslogLevel {
    match level {
        Level::Debug => SyslogLevel::Debug,
        Level::Info => SyslogLevel::Informational,
        Level::Warn => SyslogLevel::Notice,
        Level::Error => SyslogLevel::Warning,
        Level::Fatal => SyslogLevel::Error,
        Level::Unknown => SyslogLevel::Alert,
    }
}
