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
//! [gelf-notifier](crate) errors

use backtrace::Backtrace;

/// [gelf-notifier](crate) error type
///
/// [gelf-notifier](crate) eschews libraries like [thiserror], [anyhow] & [Snafu] in favor of
/// a straightforward enumeration with a few match arms chosen on the basis what the caller will
/// need to repond.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
/// [Snafu]: https://docs.rs/snafu/latest/snafu
#[non_exhaustive]
pub enum Error {
    /// A mandatory GELF field was absent or empty after normalization
    MissingField {
        field: &'static str,
        back: Backtrace,
    },
    /// There was nothing to encode
    EmptyPayload { back: Backtrace },
    /// The compressed message would need more chunks than a collector will reassemble
    ChunkLimitExceeded {
        chunks: usize,
        limit: usize,
        back: Backtrace,
    },
    /// A `level` field that is neither a known level number nor a level name
    InvalidLevel {
        value: String,
        back: Backtrace,
    },
    /// A maximum chunk size that is neither "WAN", "LAN" nor a positive byte count
    InvalidChunkSize {
        value: String,
        back: Backtrace,
    },
    /// Failed to serialize an event to JSON
    Serialize {
        source: serde_json::Error,
        back: Backtrace,
    },
    /// Failed to deflate a serialized event
    Compress {
        source: std::io::Error,
        back: Backtrace,
    },
    /// General transport layer error
    Transport {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        back: Backtrace,
    },
}

impl Error {
    /// The name of this error's variant; used as the "class" of the GELF message describing it.
    // `Error` is non-exhaustive, but within the crate the compiler still checks this match.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingField { .. } => "MissingField",
            Error::EmptyPayload { .. } => "EmptyPayload",
            Error::ChunkLimitExceeded { .. } => "ChunkLimitExceeded",
            Error::InvalidLevel { .. } => "InvalidLevel",
            Error::InvalidChunkSize { .. } => "InvalidChunkSize",
            Error::Serialize { .. } => "Serialize",
            Error::Compress { .. } => "Compress",
            Error::Transport { .. } => "Transport",
        }
    }

    /// The backtrace captured where this error was raised
    pub fn backtrace(&self) -> &Backtrace {
        match self {
            Error::MissingField { back, .. }
            | Error::EmptyPayload { back }
            | Error::ChunkLimitExceeded { back, .. }
            | Error::InvalidLevel { back, .. }
            | Error::InvalidChunkSize { back, .. }
            | Error::Serialize { back, .. }
            | Error::Compress { back, .. }
            | Error::Transport { back, .. } => back,
        }
    }

    pub(crate) fn transport<E>(err: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport {
            source: Box::new(err),
            back: Backtrace::new(),
        }
    }
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::MissingField { field, .. } => write!(
                f,
                "{} is missing. Options version, short_message and host must be set.",
                field
            ),
            Error::EmptyPayload { .. } => write!(f, "Refusing to encode an empty event"),
            Error::ChunkLimitExceeded { chunks, limit, .. } => write!(
                f,
                "The message would require {} chunks; collectors accept at most {}",
                chunks, limit
            ),
            Error::InvalidLevel { value, .. } => write!(f, "{} is not a GELF level", value),
            Error::InvalidChunkSize { value, .. } => write!(
                f,
                "{} is not a chunk size (expected \"WAN\", \"LAN\" or a positive byte count)",
                value
            ),
            Error::Serialize { source, .. } => {
                write!(f, "While serializing an event to JSON, got {}", source)
            }
            Error::Compress { source, .. } => {
                write!(f, "While compressing an event, got {}", source)
            }
            Error::Transport { source, .. } => write!(f, "Transport error: {}", source),
            _ => write!(f, "Other gelf-notifier error"),
        }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}\n{:?}", self, self.backtrace())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Serialize { source, .. } => Some(source),
            Error::Compress { source, .. } => Some(source),
            Error::Transport { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
