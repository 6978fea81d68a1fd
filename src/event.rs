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

//! Turning caller input into a complete GELF event.
//!
//! A caller may log one of three things: a map of fields, an error, or a plain message. These are
//! modelled by [`Input`]. [`normalize`] merges the input with per-call extra fields and the
//! notifier's [`Defaults`], fills in the fields a collector expects (timestamp, source location)
//! and checks that the three mandatory GELF fields are present.
//!
//! # Examples
//!
//! ```rust
//! use gelf_notifier::event::{normalize, Defaults, Fields};
//! use gelf_notifier::level::Level;
//!
//! let mut extra = Fields::new();
//! extra.insert("user".to_string(), "alice".into());
//! let event = normalize("Plain text message".into(), extra, &Defaults::default()).unwrap();
//! assert_eq!(event.get("short_message").unwrap(), "Plain text message");
//! assert_eq!(event.level().unwrap(), Some(Level::Info));
//! ```

use crate::{
    error::{Error, Result},
    level::Level,
};

use backtrace::Backtrace;
use chrono::prelude::*;
use serde::Serialize;
use serde_json::Value;

use std::path::Path;

/// The GELF version stamped on every message unless the defaults say otherwise
pub const GELF_VERSION: &str = "1.0";

/// Default `facility` field
pub const DEFAULT_FACILITY: &str = "gelf-rs";

/// Fields GELF requires on every message
pub const MANDATORY_FIELDS: [&str; 3] = ["version", "short_message", "host"];

/// A map from GELF field name to value
pub type Fields = serde_json::Map<String, Value>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          caller input                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An error, reduced to what a GELF message says about it: the error's "class", its message, and
/// the stack at the point it was raised (if known).
#[derive(Clone, Debug, PartialEq)]
pub struct Exception {
    class: String,
    message: String,
    backtrace: Option<Vec<String>>,
}

impl Exception {
    pub fn new<C: Into<String>, M: Into<String>>(class: C, message: M) -> Exception {
        Exception {
            class: class.into(),
            message: message.into(),
            backtrace: None,
        }
    }
    /// Attach stack frames, innermost first
    pub fn with_backtrace(mut self, frames: Vec<String>) -> Exception {
        self.backtrace = Some(frames);
        self
    }
    /// Describe an arbitrary error value. Its class is the unqualified name of its type; no stack
    /// trace is available for it.
    pub fn from_error<E: std::error::Error>(err: &E) -> Exception {
        Exception::new(short_type_name(std::any::type_name::<E>()), err.to_string())
    }
    pub fn class(&self) -> &str {
        &self.class
    }
    pub fn message(&self) -> &str {
        &self.message
    }
    fn into_fields(self) -> Fields {
        let trace = match self.backtrace {
            Some(frames) if !frames.is_empty() => frames.join("\n"),
            _ => "Backtrace is not available.".to_string(),
        };
        let mut fields = Fields::new();
        fields.insert(
            "short_message".to_string(),
            format!("{}: {}", self.class, self.message).into(),
        );
        fields.insert(
            "full_message".to_string(),
            format!("Backtrace:\n{}", trace).into(),
        );
        fields
    }
}

/// "std::io::error::Error" :=> "Error"; "alloc::vec::Vec<u8>" :=> "Vec"
fn short_type_name(name: &str) -> &str {
    let name = name.split('<').next().unwrap_or(name);
    name.rsplit("::").next().unwrap_or(name)
}

fn frames_from_backtrace(back: &Backtrace) -> Vec<String> {
    back.frames()
        .iter()
        .flat_map(|frame| frame.symbols())
        .map(|symbol| {
            let name = symbol
                .name()
                .map(|name| name.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            match (symbol.filename(), symbol.lineno()) {
                (Some(file), Some(line)) => format!("{}:{}:in `{}'", file.display(), line, name),
                _ => name,
            }
        })
        .collect()
}

impl std::convert::From<&Error> for Exception {
    fn from(err: &Error) -> Self {
        Exception::new(err.kind(), err.to_string())
            .with_backtrace(frames_from_backtrace(err.backtrace()))
    }
}

/// What a caller may hand the notifier
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    /// Explicit GELF fields
    Fields(Fields),
    /// An error
    Exception(Exception),
    /// Free text, to become the `short_message`
    Message(String),
}

impl std::convert::From<Fields> for Input {
    fn from(fields: Fields) -> Self {
        Input::Fields(fields)
    }
}

impl std::convert::From<Exception> for Input {
    fn from(exception: Exception) -> Self {
        Input::Exception(exception)
    }
}

impl std::convert::From<&Error> for Input {
    fn from(err: &Error) -> Self {
        Input::Exception(err.into())
    }
}

impl std::convert::From<Error> for Input {
    fn from(err: Error) -> Self {
        Input::Exception((&err).into())
    }
}

impl std::convert::From<String> for Input {
    fn from(text: String) -> Self {
        Input::Message(text)
    }
}

impl std::convert::From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Message(text.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            defaults                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Attempt to figure-out a name for this host.
///
/// Tries [gethostname()] first, then the first local IP address, and finally settles for
/// "localhost". It cannot fail.
///
/// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
pub fn default_host() -> String {
    hostname::get()
        .ok()
        .and_then(|hn| hn.into_string().ok())
        .filter(|hn| !hn.is_empty())
        .or_else(|| local_ip_address::local_ip().ok().map(|ip| ip.to_string()))
        .unwrap_or_else(|| "localhost".to_string())
}

/// The fields every event from a given notifier starts out with.
///
/// Established once, when the notifier is built; read-only thereafter.
#[derive(Clone, Debug, PartialEq)]
pub struct Defaults(Fields);

impl Defaults {
    /// Take caller-supplied defaults, filling in `version`, `host`, `level` & `facility` where
    /// they're absent.
    pub fn new(mut fields: Fields) -> Defaults {
        if is_blank(fields.get("version")) {
            fields.insert("version".to_string(), GELF_VERSION.into());
        }
        if is_blank(fields.get("host")) {
            fields.insert("host".to_string(), default_host().into());
        }
        if is_absent(fields.get("level")) {
            fields.insert("level".to_string(), Level::Unknown.into());
        }
        if is_absent(fields.get("facility")) {
            fields.insert("facility".to_string(), DEFAULT_FACILITY.into());
        }
        Defaults(fields)
    }
    pub fn fields(&self) -> &Fields {
        &self.0
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl std::default::Default for Defaults {
    fn default() -> Self {
        Defaults::new(Fields::new())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          struct Event                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A normalized GELF event: every mandatory field present, ready for encoding.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Event(Fields);

impl Event {
    /// Wrap a field map as-is; no normalization or validation is performed.
    pub fn from_fields(fields: Fields) -> Event {
        Event(fields)
    }
    pub fn fields(&self) -> &Fields {
        &self.0
    }
    pub fn into_fields(self) -> Fields {
        self.0
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// This event's application level, if it has one
    pub fn level(&self) -> Result<Option<Level>> {
        match self.0.get("level") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Level::from_value(value).map(Some),
        }
    }
    pub fn set_level(&mut self, level: Level) {
        self.0.insert("level".to_string(), level.into());
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         normalization                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn as_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Older error notifiers describe an error with `error_class` & `error_message` rather than a
/// `short_message`; translate.
fn convert_legacy_error_fields(fields: &mut Fields) {
    if is_blank(fields.get("short_message"))
        && fields.contains_key("error_class")
        && fields.contains_key("error_message")
    {
        // Both keys are known to be present.
        if let (Some(class), Some(message)) =
            (fields.remove("error_class"), fields.remove("error_message"))
        {
            fields.insert(
                "short_message".to_string(),
                format!("{}: {}", as_text(class), as_text(message)).into(),
            );
        }
    }
}

/// Locate the first stack frame outside this crate that called into it.
///
/// Walks the stack innermost-first; frames belonging to the backtrace machinery come first, then
/// our own, then the caller. Returns `None` if symbols can't be resolved (no debug info, say).
fn caller_location() -> Option<(String, u32)> {
    let own_source = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/src"));
    let mut seen_own = false;
    let mut found: Option<(String, u32)> = None;
    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            if found.is_some() {
                return;
            }
            if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                if file.starts_with(own_source) {
                    seen_own = true;
                } else if seen_own {
                    found = Some((file.display().to_string(), line));
                }
            }
        });
        found.is_none()
    });
    found
}

fn now_as_float() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0
}

/// Produce a complete GELF [`Event`] from caller input.
///
/// Fields are merged with `defaults` lowest precedence, then `extra`, then the fields derived from
/// `input`. Errors get a default level of `error`, plain messages `info`; field maps get whatever
/// level the merge yields. `file`, `line` & `timestamp` are filled-in if absent.
///
/// Fails with [`Error::MissingField`] if `version`, `short_message` or `host` ends up empty.
pub fn normalize(input: Input, extra: Fields, defaults: &Defaults) -> Result<Event> {
    let mut extra = extra;
    let primary = match input {
        Input::Fields(fields) => fields,
        Input::Exception(exception) => {
            if is_absent(extra.get("level")) {
                extra.insert("level".to_string(), Level::Error.into());
            }
            exception.into_fields()
        }
        Input::Message(text) => {
            if is_absent(extra.get("level")) {
                extra.insert("level".to_string(), Level::Info.into());
            }
            let mut fields = Fields::new();
            fields.insert("short_message".to_string(), text.into());
            fields
        }
    };

    let mut fields = defaults.fields().clone();
    fields.extend(extra);
    fields.extend(primary);

    convert_legacy_error_fields(&mut fields);

    if is_absent(fields.get("file")) || is_absent(fields.get("line")) {
        if let Some((file, line)) = caller_location() {
            if is_absent(fields.get("file")) {
                fields.insert("file".to_string(), file.into());
            }
            if is_absent(fields.get("line")) {
                fields.insert("line".to_string(), line.into());
            }
        }
    }

    if is_absent(fields.get("timestamp")) {
        fields.insert("timestamp".to_string(), now_as_float().into());
    }

    for field in MANDATORY_FIELDS {
        if is_blank(fields.get(field)) {
            return Err(Error::MissingField {
                field,
                back: Backtrace::new(),
            });
        }
    }

    Ok(Event(fields))
}

#[cfg(test)]
mod test {

    use super::*;

    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn defaults() -> Defaults {
        Defaults::new(fields(json!({"host": "bree.local"})))
    }

    #[test]
    fn defaults_fill_gaps_only() {
        let d = Defaults::default();
        assert_eq!(d.get("version").unwrap(), GELF_VERSION);
        assert_eq!(d.get("level").unwrap(), &json!(5));
        assert_eq!(d.get("facility").unwrap(), DEFAULT_FACILITY);
        assert!(!d.get("host").unwrap().as_str().unwrap().is_empty());

        let d = Defaults::new(fields(
            json!({"version": "1.1", "host": "frodo", "level": 1, "facility": "shire"}),
        ));
        assert_eq!(d.get("version").unwrap(), "1.1");
        assert_eq!(d.get("host").unwrap(), "frodo");
        assert_eq!(d.get("level").unwrap(), &json!(1));
        assert_eq!(d.get("facility").unwrap(), "shire");
    }

    #[test]
    fn plain_text_message() {
        let event = normalize(
            "Plain text message".into(),
            fields(json!({"user": "alice"})),
            &defaults(),
        )
        .unwrap();
        assert_eq!(event.get("short_message").unwrap(), "Plain text message");
        assert_eq!(event.level().unwrap(), Some(Level::Info));
        assert_eq!(event.get("user").unwrap(), "alice");
        assert_eq!(event.get("version").unwrap(), GELF_VERSION);
        assert_eq!(event.get("host").unwrap(), "bree.local");
        assert_eq!(event.get("facility").unwrap(), DEFAULT_FACILITY);
        assert!(event.get("timestamp").unwrap().is_f64());
    }

    #[test]
    fn exception_without_backtrace() {
        let event = normalize(
            Exception::new("SecurityError", "ALARM!").into(),
            Fields::new(),
            &defaults(),
        )
        .unwrap();
        assert_eq!(event.get("short_message").unwrap(), "SecurityError: ALARM!");
        assert_eq!(event.level().unwrap(), Some(Level::Error));
        assert_eq!(
            event.get("full_message").unwrap(),
            "Backtrace:\nBacktrace is not available."
        );
    }

    #[test]
    fn exception_with_backtrace() {
        let exc = Exception::new("SecurityError", "ALARM!").with_backtrace(vec![
            "src/gate.rs:12:in `open'".to_string(),
            "src/main.rs:3:in `main'".to_string(),
        ]);
        let event = normalize(
            exc.into(),
            fields(json!({"level": Level::Fatal as u8})),
            &defaults(),
        )
        .unwrap();
        assert_eq!(
            event.get("full_message").unwrap(),
            "Backtrace:\nsrc/gate.rs:12:in `open'\nsrc/main.rs:3:in `main'"
        );
        // An explicit level in the extra fields beats the error default
        assert_eq!(event.level().unwrap(), Some(Level::Fatal));
    }

    #[test]
    fn exception_from_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let exc = Exception::from_error(&io);
        assert_eq!(exc.class(), "Error");
        assert_eq!(exc.message(), "disk on fire");

        let err = Error::EmptyPayload {
            back: Backtrace::new(),
        };
        let exc = Exception::from(&err);
        assert_eq!(exc.class(), "EmptyPayload");
        let event = normalize(err.into(), Fields::new(), &defaults()).unwrap();
        assert!(event
            .get("short_message")
            .unwrap()
            .as_str()
            .unwrap()
            .starts_with("EmptyPayload: "));
    }

    #[test]
    fn field_map_precedence() {
        let d = Defaults::new(fields(json!({"host": "bree.local", "facility": "shire"})));
        let event = normalize(
            fields(json!({"short_message": "explicit", "facility": "mordor"})).into(),
            fields(json!({"facility": "rohan", "short_message": "extra", "user": "sam"})),
            &d,
        )
        .unwrap();
        assert_eq!(event.get("short_message").unwrap(), "explicit");
        assert_eq!(event.get("facility").unwrap(), "mordor");
        assert_eq!(event.get("user").unwrap(), "sam");
        // No level default is injected for field maps; the notifier default shows through
        assert_eq!(event.level().unwrap(), Some(Level::Unknown));
    }

    #[test]
    fn missing_short_message() {
        let err = normalize(
            fields(json!({"user": "alice"})).into(),
            Fields::new(),
            &defaults(),
        )
        .unwrap_err();
        match err {
            Error::MissingField { field, .. } => assert_eq!(field, "short_message"),
            other => panic!("unexpected {:?}", other),
        }

        let err = normalize(
            fields(json!({"short_message": "hi", "host": ""})).into(),
            Fields::new(),
            &defaults(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "host", .. }));
    }

    #[test]
    fn legacy_error_fields() {
        let event = normalize(
            fields(json!({"error_class": "Exception", "error_message": "boom"})).into(),
            Fields::new(),
            &defaults(),
        )
        .unwrap();
        assert_eq!(event.get("short_message").unwrap(), "Exception: boom");
        assert!(event.get("error_class").is_none());
        assert!(event.get("error_message").is_none());

        // Left alone when there already is a short message
        let event = normalize(
            fields(json!({"short_message": "hi", "error_class": "E", "error_message": "m"}))
                .into(),
            Fields::new(),
            &defaults(),
        )
        .unwrap();
        assert_eq!(event.get("short_message").unwrap(), "hi");
        assert_eq!(event.get("error_class").unwrap(), "E");
    }

    #[test]
    fn explicit_file_line_timestamp_preserved() {
        let event = normalize(
            "hi".into(),
            fields(json!({"file": "main.rs", "line": 7, "timestamp": 1.5})),
            &defaults(),
        )
        .unwrap();
        assert_eq!(event.get("file").unwrap(), "main.rs");
        assert_eq!(event.get("line").unwrap(), &json!(7));
        assert_eq!(event.get("timestamp").unwrap(), &json!(1.5));
    }

    #[test]
    fn caller_location_skips_own_frames() {
        // Called from here, every frame under `src/` is ours; whatever is reported must be the
        // test harness frame beyond them.
        let event = normalize("hi".into(), Fields::new(), &defaults()).unwrap();
        let own_source = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/src"));
        if let Some(file) = event.get("file") {
            let file = file.as_str().unwrap();
            assert!(!Path::new(file).starts_with(own_source), "{}", file);
            assert!(event.get("line").unwrap().as_u64().unwrap() > 0);
        }
        if let Some((file, _)) = caller_location() {
            assert!(!Path::new(&file).starts_with(own_source), "{}", file);
        }
    }

    #[test]
    fn type_names() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("alloc::vec::Vec<u8>"), "Vec");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
