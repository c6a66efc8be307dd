use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::config::{LayoutConfig, SchemaVersion, UserFields};
use crate::embedded;
use crate::env::{env_opt, USER_FIELDS_ENV};
use crate::error::LayoutError;
use crate::host;
use crate::record::{Location, LogEvent, Payload};

/// Render epoch milliseconds as `yyyy-MM-ddTHH:mm:ss.SSSZ` in UTC.
///
/// Instants outside the representable range render as the Unix epoch.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// JSON object produced for one event, keys in lexicographic order.
///
/// Optional data that is absent is never stored, so the record holds no
/// `null` values unless the caller's own JSON carried them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldRecord(BTreeMap<String, Value>);

impl FieldRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    fn insert_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// Single-line JSON text with a trailing newline.
    pub fn to_json_line(&self) -> Result<String, LayoutError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0.into_iter().collect())
    }
}

/// Maps [`LogEvent`]s to logstash JSON records.
///
/// Holds only immutable configuration and the cached host name, so one
/// mapper can be shared across threads and reused for every event.
#[derive(Debug, Clone)]
pub struct EventMapper {
    config: LayoutConfig,
    host: String,
}

impl EventMapper {
    /// Create a mapper reporting the local host name.
    pub fn new(config: LayoutConfig) -> Self {
        Self::with_host(config, host::hostname())
    }

    /// Create a mapper reporting `host` as `source_host`.
    pub fn with_host(config: LayoutConfig, host: impl Into<String>) -> Self {
        Self {
            config,
            host: host.into(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn content_type(&self) -> String {
        self.config.content_type()
    }

    /// Map `event` and serialize it as one JSON line ending in `\n`.
    pub fn format(&self, event: &LogEvent) -> Result<String, LayoutError> {
        self.map(event).to_json_line()
    }

    /// Build the JSON object for `event` according to the configured schema.
    ///
    /// Never fails: malformed embedded JSON falls back to the plain
    /// message and missing optional data is left out.
    pub fn map(&self, event: &LogEvent) -> FieldRecord {
        let schema = self.config.schema;
        let mut fields = FieldRecord::default();

        let message = self.resolve_message(event, &mut fields);

        if let Some(thrown) = &event.thrown {
            let exception = thrown.to_fields(self.config.add_root_throwable);
            fields.insert("exception", Value::Object(exception));
        }

        if self.config.location_info {
            if let Some(location) = &event.location {
                put_location(&mut fields, location);
            }
        }

        fields.insert(schema.logger_key(), event.logger_name.as_str());
        fields.insert("mdc", mdc_value(&event.mdc));
        fields.insert("ndc", event.ndc.clone());
        fields.insert("level", event.level.as_str());
        fields.insert(schema.thread_key(), event.thread_name.as_str());

        let timestamp = format_timestamp(event.timestamp_millis);

        match schema {
            SchemaVersion::V1 => {
                fields.insert("@version", 1);
                fields.insert("@timestamp", timestamp);
                fields.insert("source_host", self.host.as_str());
                fields.insert("message", message);
                self.apply_user_fields(&mut fields);
                fields
            }
            SchemaVersion::Legacy => {
                self.apply_user_fields(&mut fields);
                let mut envelope = FieldRecord::default();
                envelope.insert("@message", message);
                envelope.insert("@source_host", self.host.as_str());
                envelope.insert("@timestamp", timestamp);
                envelope.insert("@fields", fields.into_value());
                envelope
            }
        }
    }

    fn resolve_message(&self, event: &LogEvent, fields: &mut FieldRecord) -> Value {
        match &event.payload {
            Payload::Map(message) => {
                let params: Map<String, Value> = message
                    .parameters()
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect();
                fields.insert("message_parameters", Value::Object(params));
                Value::String(message.formatted_message())
            }
            payload => {
                if let Payload::Parameterized(args) = payload {
                    if self.config.message_parameters {
                        let params: Map<String, Value> = args
                            .iter()
                            .enumerate()
                            .map(|(i, v)| (format!("param_{}", i), v.clone()))
                            .collect();
                        fields.insert("message_parameters", Value::Object(params));
                    }
                }

                match embedded::split(&event.message) {
                    Some(embedded) => {
                        fields.insert("context", Value::Object(embedded.context));
                        embedded.message
                    }
                    None => Value::String(event.message.clone()),
                }
            }
        }
    }

    /// Merge static user fields last. A value set in the process
    /// environment replaces the configured list and is re-read per event.
    fn apply_user_fields(&self, fields: &mut FieldRecord) {
        let overridden = env_opt(USER_FIELDS_ENV).map(|v| UserFields::parse(&v));
        let user_fields = overridden.as_ref().unwrap_or(&self.config.user_fields);
        for (key, value) in user_fields.iter() {
            fields.insert(key, value);
        }
    }
}

fn put_location(fields: &mut FieldRecord, location: &Location) {
    fields.insert_opt("file", location.file.as_deref());
    fields.insert_opt("line_number", location.line);
    fields.insert_opt("class", location.class.as_deref());
    fields.insert_opt("method", location.method.as_deref());
}

fn mdc_value(mdc: &BTreeMap<String, String>) -> Value {
    Value::Object(
        mdc.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use crate::template::MapMessage;
    use crate::throwable::{ThrowableChain, ThrowableNode};
    use serde_json::json;

    fn mapper(config: LayoutConfig) -> EventMapper {
        EventMapper::with_host(config, "test-host")
    }

    fn simple_event(message: &str) -> LogEvent {
        LogEvent::new("a.B", Level::Warn, message)
            .with_timestamp_millis(1364844991207)
            .with_thread_name("MyThreadName")
    }

    fn full_event() -> LogEvent {
        simple_event("Msg")
            .with_ndc(["stack_msg1", "stack_msg2"])
            .with_mdc_entry("MDC.A", "A_Value")
            .with_mdc_entry("MDC.B", "B_Value")
            .with_location(Location {
                file: Some("LogEventFixtures.java".into()),
                line: Some(42),
                class: Some("net.logstash.log4j2.LogEventFixtures".into()),
                method: Some("createLogEvent".into()),
            })
            .with_thrown(
                ThrowableChain::new(
                    ThrowableNode::new("java.io.IOException", Some("testIOEx".into()))
                        .with_stack_trace("java.io.IOException: testIOEx\nCaused by: java.lang.NullPointerException: testNPEx"),
                )
                .caused_by(
                    ThrowableNode::new("java.lang.NullPointerException", Some("testNPEx".into()))
                        .with_stack_trace("java.lang.NullPointerException: testNPEx"),
                ),
            )
    }

    #[test]
    fn timestamp_format() {
        assert_eq!(format_timestamp(1364844991207), "2013-04-01T19:36:31.207Z");
        assert_eq!(format_timestamp(1), "1970-01-01T00:00:00.001Z");
        assert_eq!(format_timestamp(i64::MAX), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn v1_has_expected_keys() {
        let config = LayoutConfig::v1()
            .with_location_info(true)
            .with_user_fields("field2:value2,field3:value3");
        let record = mapper(config).map(&full_event());

        let mut keys: Vec<&str> = record.keys().collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "@timestamp", "@version", "class", "exception", "field2", "field3", "file",
                "level", "line_number", "logger_name", "mdc", "message", "method", "ndc",
                "source_host", "thread_name",
            ]
        );
        assert_eq!(record.get("@version"), Some(&json!(1)));
        assert_eq!(record.get("line_number"), Some(&json!(42)));
        assert_eq!(record.get("ndc"), Some(&json!(["stack_msg1", "stack_msg2"])));
        assert_eq!(record.get("mdc"), Some(&json!({"MDC.A": "A_Value", "MDC.B": "B_Value"})));
        assert_eq!(record.get("level"), Some(&json!("WARN")));
        assert_eq!(record.get("source_host"), Some(&json!("test-host")));
    }

    #[test]
    fn v1_without_location_info() {
        let record = mapper(LayoutConfig::v1()).map(&full_event());
        for key in ["file", "line_number", "class", "method"] {
            assert!(!record.contains_key(key), "unexpected {}", key);
        }
    }

    #[test]
    fn partial_location_emits_known_parts() {
        let event = simple_event("Msg").with_location(Location {
            file: Some("main.rs".into()),
            line: None,
            class: None,
            method: Some("run".into()),
        });
        let record = mapper(LayoutConfig::v1().with_location_info(true)).map(&event);
        assert_eq!(record.get("file"), Some(&json!("main.rs")));
        assert_eq!(record.get("method"), Some(&json!("run")));
        assert!(!record.contains_key("line_number"));
        assert!(!record.contains_key("class"));
    }

    #[test]
    fn legacy_envelope() {
        let record = mapper(LayoutConfig::legacy()).map(&simple_event("this is a test message"));
        let mut keys: Vec<&str> = record.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["@fields", "@message", "@source_host", "@timestamp"]);

        let fields = record.get("@fields").unwrap();
        assert_eq!(fields["loggerName"], "a.B");
        assert_eq!(fields["threadName"], "MyThreadName");
        assert_eq!(fields["mdc"], json!({}));
        assert_eq!(fields["ndc"], json!([]));
        assert!(fields.get("context").is_none());
        assert!(fields.get("exception").is_none());
        assert_eq!(record.get("@message"), Some(&json!("this is a test message")));
    }

    #[test]
    fn exception_with_root_cause() {
        let record = mapper(LayoutConfig::v1()).map(&full_event());
        let exception = record.get("exception").unwrap();
        assert_eq!(exception["exception_class"], "java.io.IOException");
        assert_eq!(exception["exception_message"], "testIOEx");
        assert_eq!(exception["root_exception_class"], "java.lang.NullPointerException");
        assert_eq!(exception["root_exception_message"], "testNPEx");
        assert_ne!(exception["stacktrace"], exception["root_stacktrace"]);
    }

    #[test]
    fn exception_without_root_fields() {
        let config = LayoutConfig::v1().with_add_root_throwable(false);
        let record = mapper(config).map(&full_event());
        let exception = record.get("exception").unwrap().as_object().unwrap();
        assert!(!exception.contains_key("root_exception_class"));
        assert!(!exception.contains_key("root_exception_message"));
        assert!(!exception.contains_key("root_stacktrace"));
    }

    #[test]
    fn exception_without_cause_repeats_top_as_root() {
        let event = simple_event("uh-oh").with_thrown(ThrowableChain::new(
            ThrowableNode::new("java.lang.IllegalArgumentException", Some("on fire".into()))
                .with_stack_trace("java.lang.IllegalArgumentException: on fire"),
        ));
        let record = mapper(LayoutConfig::legacy()).map(&event);
        let exception = &record.get("@fields").unwrap()["exception"];
        assert_eq!(exception["stacktrace"], exception["root_stacktrace"]);
        assert_eq!(exception["root_exception_class"], "java.lang.IllegalArgumentException");
    }

    #[test]
    fn embedded_json_becomes_context() {
        let event = simple_event("{'message': 'test', 'deeper': [1, 2, 3], 'nested': {'some': 'thing'}}");
        let record = mapper(LayoutConfig::legacy()).map(&event);
        assert_eq!(record.get("@message"), Some(&json!("test")));
        let context = &record.get("@fields").unwrap()["context"];
        assert_eq!(context, &json!({"deeper": [1, 2, 3], "nested": {"some": "thing"}}));
    }

    #[test]
    fn malformed_embedded_json_is_verbatim() {
        let record = mapper(LayoutConfig::v1()).map(&simple_event("{not_json: [in brackets}"));
        assert_eq!(record.get("message"), Some(&json!("{not_json: [in brackets}")));
        assert!(!record.contains_key("context"));
    }

    #[test]
    fn map_message_parameters_are_strings() {
        let message = MapMessage::new(
            "All together. This is {type} info.The ultimate answer is {answer}. Today it is {status}",
        )
        .add("type", "great")
        .add("answer", 42)
        .add("status", false);
        let event = LogEvent::from_map_message("testLogMessageMapMessage", Level::Info, message);
        let record = mapper(LayoutConfig::v1()).map(&event);

        assert_eq!(
            record.get("message"),
            Some(&json!("All together. This is great info.The ultimate answer is 42. Today it is false"))
        );
        assert_eq!(
            record.get("message_parameters"),
            Some(&json!({"type": "great", "answer": "42", "status": "false"}))
        );
    }

    #[test]
    fn positional_parameters_keep_types() {
        let event = simple_event("All together. This is great info.The ultimate answer is 42. Today it is true")
            .with_parameters(vec![json!("great"), json!(42), json!(true)]);

        let record = mapper(LayoutConfig::v1()).map(&event);
        assert!(!record.contains_key("message_parameters"));

        let record = mapper(LayoutConfig::v1().with_message_parameters(true)).map(&event);
        assert_eq!(
            record.get("message_parameters"),
            Some(&json!({"param_0": "great", "param_1": 42, "param_2": true}))
        );
    }

    #[test]
    fn user_fields_override_computed_fields() {
        let config = LayoutConfig::v1().with_user_fields("level:OVERRIDDEN");
        let record = mapper(config).map(&full_event());
        assert_eq!(record.get("level"), Some(&json!("OVERRIDDEN")));
    }

    #[test]
    fn empty_user_field_value_keeps_computed_field() {
        let config = LayoutConfig::v1().with_user_fields("level:");
        let event = LogEvent::new("a.B", Level::Error, "boom");
        let record = mapper(config).map(&event);
        assert_eq!(record.get("level"), Some(&json!("ERROR")));
    }

    #[test]
    fn format_is_one_json_line() {
        let line = mapper(LayoutConfig::legacy()).format(&full_event()).unwrap();
        assert!(line.ends_with("}\n"));
        assert!(line.starts_with('{'));
        assert_eq!(line.matches('\n').count(), 1);
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert!(parsed.is_object());
    }

    #[test]
    fn thread_name_is_always_present() {
        let event = std::thread::spawn(|| LogEvent::new("a.B", Level::Info, "unnamed"))
            .join()
            .unwrap();
        let record = mapper(LayoutConfig::v1()).map(&event);
        let thread = record.get("thread_name").and_then(Value::as_str).unwrap();
        assert!(thread.starts_with("ThreadId("));

        let record = mapper(LayoutConfig::legacy()).map(&event);
        assert_eq!(record.get("@fields").unwrap()["threadName"], thread);
    }
}
