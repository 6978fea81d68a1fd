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

//! GELF chunking.
//!
//! A compressed GELF message that won't fit in a single datagram is split into "chunks", each
//! prefixed with a twelve-byte header:
//!
//! ```text
//!  0      2                    10    11    12
//! +------+--------------------+-----+-----+----------------
//! | 1e0f |     message id     | seq | cnt | payload slice...
//! +------+--------------------+-----+-----+----------------
//! ```
//!
//! All chunks of a message share the message id & count; the collector uses them to reassemble the
//! message, in whatever order the chunks arrive. Graylog will not reassemble more than
//! [`MAX_CHUNKS`] chunks, so [`chunk`] refuses to produce more.

use crate::error::{Error, Result};

use backtrace::Backtrace;
use bytes::buf::BufMut;
use chrono::prelude::*;
use serde::{Deserialize, Serialize};

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering},
};

type StdResult<T, E> = std::result::Result<T, E>;

/// Leading bytes of every chunk datagram
pub const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];

/// Size of the chunk header: magic, message id, sequence number & chunk count
pub const CHUNK_HEADER_LEN: usize = 12;

/// The most chunks a collector will reassemble into one message
pub const MAX_CHUNKS: usize = 128;

/// Chunk size safe for Internet-routed paths
pub const WAN_CHUNK_SIZE: usize = 1420;

/// Chunk size safe for typical local networks
pub const LAN_CHUNK_SIZE: usize = 8154;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       enum MaxChunkSize                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The largest payload that will be sent as a single datagram (or as a single chunk).
///
/// Configured as "WAN", "LAN" (in any case) or a literal byte count.
///
/// ```rust
/// use gelf_notifier::chunker::MaxChunkSize;
/// assert_eq!("wan".parse::<MaxChunkSize>().unwrap().bytes(), 1420);
/// assert_eq!("LAN".parse::<MaxChunkSize>().unwrap().bytes(), 8154);
/// assert_eq!("500".parse::<MaxChunkSize>().unwrap().bytes(), 500);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChunkSizeRepr", into = "ChunkSizeRepr")]
pub enum MaxChunkSize {
    Wan,
    Lan,
    Bytes(usize),
}

impl MaxChunkSize {
    /// A literal chunk size; zero is refused.
    pub fn new(bytes: usize) -> Result<MaxChunkSize> {
        if bytes == 0 {
            Err(Error::InvalidChunkSize {
                value: bytes.to_string(),
                back: Backtrace::new(),
            })
        } else {
            Ok(MaxChunkSize::Bytes(bytes))
        }
    }
    pub fn bytes(&self) -> usize {
        match self {
            MaxChunkSize::Wan => WAN_CHUNK_SIZE,
            MaxChunkSize::Lan => LAN_CHUNK_SIZE,
            MaxChunkSize::Bytes(n) => *n,
        }
    }
}

impl std::default::Default for MaxChunkSize {
    /// The default is the conservative "WAN" size.
    fn default() -> Self {
        MaxChunkSize::Wan
    }
}

impl std::fmt::Display for MaxChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        match self {
            MaxChunkSize::Wan => write!(f, "WAN"),
            MaxChunkSize::Lan => write!(f, "LAN"),
            MaxChunkSize::Bytes(n) => write!(f, "{}", n),
        }
    }
}

impl std::str::FromStr for MaxChunkSize {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wan" => Ok(MaxChunkSize::Wan),
            "lan" => Ok(MaxChunkSize::Lan),
            text => text
                .parse::<usize>()
                .map_err(|_| Error::InvalidChunkSize {
                    value: s.to_string(),
                    back: Backtrace::new(),
                })
                .and_then(MaxChunkSize::new),
        }
    }
}

impl std::convert::TryFrom<usize> for MaxChunkSize {
    type Error = Error;
    fn try_from(bytes: usize) -> Result<Self> {
        MaxChunkSize::new(bytes)
    }
}

/// How a [`MaxChunkSize`] appears in configuration: a name or a number.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkSizeRepr {
    Bytes(usize),
    Name(String),
}

impl std::convert::TryFrom<ChunkSizeRepr> for MaxChunkSize {
    type Error = Error;
    fn try_from(repr: ChunkSizeRepr) -> Result<Self> {
        match repr {
            ChunkSizeRepr::Bytes(n) => MaxChunkSize::new(n),
            ChunkSizeRepr::Name(s) => s.parse(),
        }
    }
}

impl std::convert::From<MaxChunkSize> for ChunkSizeRepr {
    fn from(size: MaxChunkSize) -> Self {
        match size {
            MaxChunkSize::Bytes(n) => ChunkSizeRepr::Bytes(n),
            named => ChunkSizeRepr::Name(named.to_string()),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          message ids                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Number of chunked messages sent by this process so far
static LAST_CHUNK_ID: AtomicU64 = AtomicU64::new(0);

/// Produce a fresh eight-byte message id.
///
/// Every call takes a new value from a process-wide counter, which is hashed along with the wall
/// clock time & process id.
pub fn next_message_id() -> [u8; 8] {
    let id = LAST_CHUNK_ID.fetch_add(1, Ordering::Relaxed) + 1;
    let now = Utc::now();
    let mut hasher = DefaultHasher::new();
    (
        now.timestamp(),
        now.timestamp_subsec_nanos(),
        std::process::id(),
        id,
    )
        .hash(&mut hasher);
    hasher.finish().to_be_bytes()
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            chunking                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Split `payload` into datagrams of at most `max_chunk_size` payload bytes each.
///
/// A payload that fits is returned as-is, without a chunk header. Anything larger is split into
/// `ceil(len / max_chunk_size)` chunks sharing a freshly-minted message id. If that would be more
/// than [`MAX_CHUNKS`], nothing is produced and [`Error::ChunkLimitExceeded`] is returned.
pub fn chunk(payload: Vec<u8>, max_chunk_size: usize) -> Result<Vec<Vec<u8>>> {
    if max_chunk_size == 0 {
        return Err(Error::InvalidChunkSize {
            value: max_chunk_size.to_string(),
            back: Backtrace::new(),
        });
    }
    if payload.len() <= max_chunk_size {
        return Ok(vec![payload]);
    }

    let count = (payload.len() + max_chunk_size - 1) / max_chunk_size;
    if count > MAX_CHUNKS {
        return Err(Error::ChunkLimitExceeded {
            chunks: count,
            limit: MAX_CHUNKS,
            back: Backtrace::new(),
        });
    }

    let id = next_message_id();
    Ok(payload
        .chunks(max_chunk_size)
        .enumerate()
        .map(|(seq, slice)| {
            let mut buf = Vec::with_capacity(CHUNK_HEADER_LEN + slice.len());
            buf.put_slice(&CHUNK_MAGIC);
            buf.put_slice(&id);
            // `count` <= 128, so both fit in a byte
            buf.put_u8(seq as u8);
            buf.put_u8(count as u8);
            buf.put_slice(slice);
            buf
        })
        .collect())
}
