use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;

use crate::template::MapMessage;
use crate::throwable::ThrowableChain;

/// Severity of a [`LogEvent`], ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Raw message payload as handed over by the logging call.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// Plain text; the rendered message is all there is.
    #[default]
    Text,
    /// Template plus an explicit field map.
    Map(MapMessage),
    /// Positional arguments already rendered into the message.
    Parameterized(Vec<serde_json::Value>),
}

/// Call-site location. Any part may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub class: Option<String>,
    pub method: Option<String>,
}

/// Name of the calling thread, falling back to its debug id
/// (`ThreadId(7)`) for unnamed threads.
pub fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

/// Fully captured log event, the input of
/// [`EventMapper::map`](crate::mapper::EventMapper::map).
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub logger_name: String,
    pub level: Level,
    /// Rendered message text.
    pub message: String,
    pub payload: Payload,
    /// Milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
    /// Name of the logging thread, or its id when it has no name.
    pub thread_name: String,
    /// Nested diagnostic context, outermost entry first.
    pub ndc: Vec<String>,
    /// Mapped diagnostic context.
    pub mdc: BTreeMap<String, String>,
    pub location: Option<Location>,
    pub thrown: Option<ThrowableChain>,
}

impl LogEvent {
    /// Create a plain-text event stamped with the current time.
    pub fn new(logger_name: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            logger_name: logger_name.into(),
            level,
            message: message.into(),
            payload: Payload::Text,
            timestamp_millis: Utc::now().timestamp_millis(),
            thread_name: current_thread_name(),
            ndc: Vec::new(),
            mdc: BTreeMap::new(),
            location: None,
            thrown: None,
        }
    }

    /// Create an event from a map message. The rendered message is the
    /// template with its placeholders resolved.
    pub fn from_map_message(logger_name: impl Into<String>, level: Level, message: MapMessage) -> Self {
        let rendered = message.formatted_message();
        let mut event = Self::new(logger_name, level, rendered);
        event.payload = Payload::Map(message);
        event
    }

    pub fn with_timestamp_millis(mut self, millis: i64) -> Self {
        self.timestamp_millis = millis;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_ndc<I, S>(mut self, ndc: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ndc = ndc.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mdc_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mdc.insert(key.into(), value.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_thrown(mut self, thrown: ThrowableChain) -> Self {
        self.thrown = Some(thrown);
        self
    }

    pub fn with_parameters(mut self, params: Vec<serde_json::Value>) -> Self {
        self.payload = Payload::Parameterized(params);
        self
    }
}
