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

//! The [`Notifier`]: from caller input to datagrams on the wire.
//!
//! A [`Notifier`] is parameterized by its [`Transport`]; [`UdpTransport`] is the obvious choice,
//! and the default. Each message travels through the same pipeline:
//!
//! 1. [`normalize`](crate::event::normalize) the input into a GELF event
//! 2. drop it if it is less severe than the notifier's minimum level
//! 3. [`encode`](crate::encoder::encode) it (JSON, then zlib)
//! 4. [`chunk`](crate::chunker::chunk) the result if it's too big for one datagram
//! 5. hand the datagram(s) to the transport
//!
//! Each step can fail. The `*_strict` methods return any failure to the caller. The others make one
//! attempt to report the failure itself to the collector, as a message of level `unknown`; should
//! that fail too, the second error is returned.

use crate::{
    chunker::{chunk, MaxChunkSize},
    config::Config,
    encoder::encode,
    error::Result,
    event::{normalize, Defaults, Fields, Input},
    level::Level,
    transport::{Transport, UdpTransport},
};

use serde_json::Value;
use tracing::{debug, warn};

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                        struct Notifier                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Sends GELF messages to a collector.
///
/// The defaults & chunk size are fixed at construction. Sending may be switched off & on, and the
/// minimum level changed, at any time through a shared reference; the change affects subsequent
/// messages only.
pub struct Notifier<T: Transport = UdpTransport> {
    transport: T,
    defaults: Defaults,
    max_chunk_size: MaxChunkSize,
    level: AtomicU8,
    enabled: AtomicBool,
}

impl Notifier<UdpTransport> {
    /// Construct a [`Notifier`] that will send to `config.host`:`config.port` over UDP.
    pub fn new(config: Config) -> Result<Self> {
        let transport = UdpTransport::new((config.host.as_str(), config.port))?;
        Ok(Notifier::with_transport(config, transport))
    }
    /// Attempt to construct a [`Notifier`] that will send to port 12201 on localhost
    pub fn try_default() -> Result<Self> {
        Notifier::new(Config::default())
    }
    pub fn builder() -> NotifierBuilder {
        NotifierBuilder {
            config: Config::default(),
        }
    }
}

impl<T: Transport> Notifier<T> {
    /// Construct a [`Notifier`] with a custom [`Transport`]; `config.host` & `config.port` are
    /// ignored.
    pub fn with_transport(config: Config, transport: T) -> Self {
        Notifier {
            transport,
            defaults: Defaults::new(config.defaults),
            max_chunk_size: config.max_chunk_size,
            level: AtomicU8::new(config.level as u8),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }
    pub fn max_chunk_size(&self) -> MaxChunkSize {
        self.max_chunk_size
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// The minimum level of messages this notifier will send
    pub fn level(&self) -> Level {
        // Only ever stores valid levels
        Level::try_from(self.level.load(Ordering::Relaxed)).unwrap_or(Level::Debug)
    }
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Send `input`, with the additional fields `extra`.
    ///
    /// `input` may be a [`Fields`] map, an [`Exception`](crate::event::Exception), or anything
    /// convertible to a [`String`]:
    ///
    /// ```no_run
    /// use gelf_notifier::{event::Fields, notifier::Notifier};
    /// let notifier = Notifier::try_default().unwrap();
    /// let mut extra = Fields::new();
    /// extra.insert("scribe".to_string(), "alice".into());
    /// notifier.notify("Plain olde text message", extra).unwrap();
    /// ```
    ///
    /// If anything goes wrong, one attempt is made to send a message describing the failure
    /// instead. Only if that fails, too, is an error returned.
    pub fn notify<I: Into<Input>>(&self, input: I, extra: Fields) -> Result<()> {
        self.dispatch_or_report(None, input.into(), extra)
    }

    /// As [`Notifier::notify`], but the message is sent at `level` regardless of any level in
    /// `input` or `extra`.
    pub fn notify_with_level<I: Into<Input>>(
        &self,
        level: Level,
        input: I,
        extra: Fields,
    ) -> Result<()> {
        self.dispatch_or_report(Some(level), input.into(), extra)
    }

    /// Send `input`, with the additional fields `extra`; any failure is returned to the caller.
    pub fn notify_strict<I: Into<Input>>(&self, input: I, extra: Fields) -> Result<()> {
        self.dispatch(None, input.into(), extra)
    }

    /// As [`Notifier::notify_strict`], but the message is sent at `level` regardless of any level
    /// in `input` or `extra`.
    pub fn notify_with_level_strict<I: Into<Input>>(
        &self,
        level: Level,
        input: I,
        extra: Fields,
    ) -> Result<()> {
        self.dispatch(Some(level), input.into(), extra)
    }

    fn dispatch_or_report(&self, level: Option<Level>, input: Input, extra: Fields) -> Result<()> {
        match self.dispatch(level, input, extra) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("Failed to send a GELF message ({}); reporting that instead", err);
                self.dispatch(Some(Level::Unknown), Input::from(&err), Fields::new())
            }
        }
    }

    fn dispatch(&self, level: Option<Level>, input: Input, extra: Fields) -> Result<()> {
        if !self.is_enabled() {
            debug!("Notifier disabled; dropping message");
            return Ok(());
        }

        let mut event = normalize(input, extra, &self.defaults)?;
        if let Some(level) = level {
            event.set_level(level);
        }

        let threshold = self.level();
        if let Some(level) = event.level()? {
            if level.is_less_severe_than(threshold) {
                let preview = event
                    .get("short_message")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                debug!(
                    "Dropping {} message {:?}; minimum level is {}",
                    level, preview, threshold
                );
                return Ok(());
            }
        }

        let datagrams = chunk(encode(&event)?, self.max_chunk_size.bytes())?;
        if datagrams.len() > 1 {
            debug!("Sending GELF message in {} chunks", datagrams.len());
        }
        self.transport.send_datagrams(&datagrams)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                     struct NotifierBuilder                                     //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Build a [`Notifier`] one setting at a time
///
/// ```rust
/// use gelf_notifier::{level::Level, notifier::Notifier};
/// let notifier = Notifier::builder()
///     .host("127.0.0.1")
///     .port(12201)
///     .max_chunk_size_as_string("LAN")
///     .unwrap()
///     .level(Level::Info)
///     .default_field("facility", "billing")
///     .build()
///     .unwrap();
/// assert_eq!(notifier.max_chunk_size().bytes(), 8154);
/// ```
pub struct NotifierBuilder {
    config: Config,
}

impl NotifierBuilder {
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }
    pub fn max_chunk_size(mut self, size: MaxChunkSize) -> Self {
        self.config.max_chunk_size = size;
        self
    }
    /// "WAN", "LAN" or a byte count
    pub fn max_chunk_size_as_string(mut self, size: &str) -> Result<Self> {
        self.config.max_chunk_size = size.parse()?;
        Ok(self)
    }
    pub fn level(mut self, level: Level) -> Self {
        self.config.level = level;
        self
    }
    pub fn default_field<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.config.defaults.insert(key.into(), value.into());
        self
    }
    pub fn defaults(mut self, defaults: Fields) -> Self {
        self.config.defaults = defaults;
        self
    }
    /// Build a [`Notifier`] sending over UDP to the configured host & port
    pub fn build(self) -> Result<Notifier<UdpTransport>> {
        Notifier::new(self.config)
    }
    pub fn build_with_transport<T: Transport>(self, transport: T) -> Notifier<T> {
        Notifier::with_transport(self.config, transport)
    }
}

#[cfg(test)]
mod smoke {

    use super::*;

    use crate::{
        chunker::{CHUNK_HEADER_LEN, CHUNK_MAGIC},
        error::Error,
    };

    use flate2::read::ZlibDecoder;
    use serde_json::json;

    use std::{io::Read, sync::Mutex};

    /// Records every datagram; optionally fails every send
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Vec<u8>>>,
        fail: bool,
    }

    impl Recorder {
        fn failing() -> Recorder {
            Recorder {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }
        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for Recorder {
        fn send(&self, buf: &[u8]) -> Result<usize> {
            if self.fail {
                return Err(Error::transport(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "nobody home",
                )));
            }
            self.sent.lock().unwrap().push(buf.to_vec());
            Ok(buf.len())
        }
    }

    fn notifier() -> Notifier<Recorder> {
        Notifier::builder()
            .default_field("host", "bree.local")
            .build_with_transport(Recorder::default())
    }

    /// Reassemble (if need be) & decode one message's worth of datagrams
    fn decode(datagrams: &[Vec<u8>]) -> Value {
        let payload: Vec<u8> = if datagrams[0].starts_with(&CHUNK_MAGIC) {
            let mut chunks: Vec<&Vec<u8>> = datagrams.iter().collect();
            chunks.sort_by_key(|d| d[10]);
            chunks
                .iter()
                .flat_map(|d| d[CHUNK_HEADER_LEN..].iter().copied())
                .collect()
        } else {
            assert_eq!(datagrams.len(), 1);
            datagrams[0].clone()
        };
        let mut json = String::new();
        ZlibDecoder::new(&payload[..])
            .read_to_string(&mut json)
            .unwrap();
        serde_json::from_str(&json).unwrap()
    }

    /// Something zlib can't squeeze down to nothing
    fn noise(len: usize) -> String {
        let mut x: u32 = 0x2545_f491;
        (0..len)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                char::from(b'!' + (x % 90) as u8)
            })
            .collect()
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn plain_message() {
        let n = notifier();
        n.notify("Hello, world!", fields(json!({"user": "alice"})))
            .unwrap();
        let msg = decode(&n.transport().sent());
        assert_eq!(msg["short_message"], "Hello, world!");
        assert_eq!(msg["host"], "bree.local");
        assert_eq!(msg["user"], "alice");
        assert_eq!(msg["version"], "1.0");
        assert_eq!(msg["facility"], "gelf-rs");
        // info :=> syslog informational
        assert_eq!(msg["level"], json!(6));
        assert!(msg["timestamp"].is_f64());
    }

    #[test]
    fn disabled_notifiers_send_nothing() {
        let n = notifier();
        n.disable();
        assert!(!n.is_enabled());
        n.notify("Hello", Fields::new()).unwrap();
        n.notify_strict(Fields::new(), Fields::new()).unwrap();
        assert!(n.transport().sent().is_empty());

        n.enable();
        n.notify("Hello", Fields::new()).unwrap();
        assert_eq!(n.transport().sent().len(), 1);
    }

    #[test]
    fn less_severe_messages_are_dropped() {
        let n = notifier();
        n.set_level(Level::Warn);
        assert_eq!(n.level(), Level::Warn);

        n.notify("chatter", Fields::new()).unwrap();
        n.notify_with_level(Level::Debug, "more chatter", Fields::new())
            .unwrap();
        assert!(n.transport().sent().is_empty());

        n.notify_with_level(Level::Warn, "heads up", Fields::new())
            .unwrap();
        n.notify(
            crate::event::Exception::new("SecurityError", "ALARM!"),
            Fields::new(),
        )
        .unwrap();
        assert_eq!(n.transport().sent().len(), 2);
    }

    #[test]
    fn explicit_level_wins() {
        let n = notifier();
        n.notify_with_level(
            Level::Fatal,
            "it's bad",
            fields(json!({"level": Level::Debug as u8})),
        )
        .unwrap();
        let msg = decode(&n.transport().sent());
        assert_eq!(msg["level"], json!(3));
    }

    #[test]
    fn strict_propagates() {
        let n = notifier();
        let err = n
            .notify_strict(fields(json!({"user": "alice"})), Fields::new())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                field: "short_message",
                ..
            }
        ));
        assert!(n.transport().sent().is_empty());

        let n = Notifier::builder().build_with_transport(Recorder::failing());
        assert!(matches!(
            n.notify_with_level_strict(Level::Info, "hi", Fields::new()),
            Err(Error::Transport { .. })
        ));
    }

    #[test]
    fn safe_reports_the_failure() {
        let n = notifier();
        n.notify(fields(json!({"user": "alice"})), Fields::new())
            .unwrap();
        let msg = decode(&n.transport().sent());
        assert!(msg["short_message"]
            .as_str()
            .unwrap()
            .starts_with("MissingField: short_message is missing"));
        assert!(msg["full_message"]
            .as_str()
            .unwrap()
            .starts_with("Backtrace:\n"));
        // unknown :=> syslog alert
        assert_eq!(msg["level"], json!(1));
        // The report is a fresh event: nothing from the failed call's fields
        assert!(msg.get("user").is_none());
    }

    #[test]
    fn safe_recovery_passes_the_level_filter() {
        let n = notifier();
        n.set_level(Level::Fatal);
        n.notify(
            fields(json!({"short_message": "hi", "level": "bogus"})),
            Fields::new(),
        )
        .unwrap();
        assert_eq!(n.transport().sent().len(), 1);
    }

    #[test]
    fn safe_gives_up_after_one_retry() {
        let n = Notifier::builder().build_with_transport(Recorder::failing());
        assert!(matches!(
            n.notify("hi", Fields::new()),
            Err(Error::Transport { .. })
        ));
    }

    #[test]
    fn big_messages_are_chunked() {
        let n = Notifier::builder()
            .default_field("host", "bree.local")
            .max_chunk_size(MaxChunkSize::new(100).unwrap())
            .build_with_transport(Recorder::default());
        let text = noise(2000);
        n.notify_strict(text.as_str(), Fields::new()).unwrap();
        let sent = n.transport().sent();
        assert!(sent.len() > 1);
        assert!(sent.iter().all(|d| d.len() <= CHUNK_HEADER_LEN + 100));
        let msg = decode(&sent);
        assert_eq!(msg["short_message"], text.as_str());
    }

    #[test]
    fn too_many_chunks() {
        let n = Notifier::builder()
            .default_field("host", "bree.local")
            .max_chunk_size(MaxChunkSize::new(1).unwrap())
            .build_with_transport(Recorder::default());
        assert!(matches!(
            n.notify_strict(noise(500), Fields::new()),
            Err(Error::ChunkLimitExceeded { .. })
        ));
        assert!(n.transport().sent().is_empty());
    }
}
