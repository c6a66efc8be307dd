use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::env::{
    env_opt, env_or, ADD_ROOT_THROWABLE_ENV, CHARSET_ENV, LOCATION_INFO_ENV,
    MESSAGE_PARAMETERS_ENV, SCHEMA_ENV, USER_FIELDS_ENV,
};
use crate::error::ConfigError;

/// Output shape of a mapped event.
///
/// `V1` is the canonical schema: every key at the top level plus
/// `"@version": 1`. `Legacy` nests the fields under `@fields` inside an
/// `@message`/`@source_host`/`@timestamp` envelope and spells a few keys
/// in camel case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    Legacy,
    #[default]
    V1,
}

impl SchemaVersion {
    /// Location info is on by default for the legacy schema only.
    pub fn default_location_info(&self) -> bool {
        matches!(self, SchemaVersion::Legacy)
    }

    pub fn logger_key(&self) -> &'static str {
        match self {
            SchemaVersion::Legacy => "loggerName",
            SchemaVersion::V1 => "logger_name",
        }
    }

    pub fn thread_key(&self) -> &'static str {
        match self {
            SchemaVersion::Legacy => "threadName",
            SchemaVersion::V1 => "thread_name",
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v0" => Ok(SchemaVersion::Legacy),
            "v1" => Ok(SchemaVersion::V1),
            _ => Err(ConfigError::InvalidSchema(s.to_string())),
        }
    }
}

/// One static `key:value` pair merged into every event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserField {
    pub key: String,
    pub value: String,
}

/// Ordered list of static user fields.
///
/// Deserializes from either the `key:value,key2:value2` string form or a
/// list of `{ key, value }` objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawUserFields")]
pub struct UserFields(Vec<UserField>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserFields {
    Text(String),
    Pairs(Vec<UserField>),
}

impl From<RawUserFields> for UserFields {
    fn from(raw: RawUserFields) -> Self {
        match raw {
            RawUserFields::Text(text) => UserFields::parse(&text),
            RawUserFields::Pairs(pairs) => UserFields(pairs),
        }
    }
}

impl UserFields {
    /// Parse the comma separated, colon separated form. Entries that do not
    /// split into exactly one key and one non-empty value are skipped.
    pub fn parse(text: &str) -> Self {
        let mut fields = Vec::new();
        for entry in text.split(',').filter(|e| !e.trim().is_empty()) {
            let mut parts: Vec<&str> = entry.split(':').collect();
            // Trailing empty parts do not count, so `key:` has no value.
            while parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
                parts.pop();
            }
            match parts.as_slice() {
                [key, value] if !value.trim().is_empty() => fields.push(UserField {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                }),
                _ => tracing::debug!(entry, "skipping malformed user field"),
            }
        }
        UserFields(fields)
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(UserField {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|f| (f.key.as_str(), f.value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromStr for UserFields {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(UserFields::parse(s))
    }
}

impl fmt::Display for UserFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", key, value)?;
        }
        Ok(())
    }
}

/// Layout options consumed by [`EventMapper`](crate::mapper::EventMapper).
///
/// **Fields**
/// - `schema`: output shape, see [`SchemaVersion`].
/// - `location_info`: emit `file`, `line_number`, `class`, `method`.
/// - `add_root_throwable`: emit `root_exception_class`,
///   `root_exception_message` and `root_stacktrace`.
/// - `message_parameters`: emit `message_parameters` for parameterized
///   messages. Map messages always carry them.
/// - `user_fields`: static fields merged last, overriding computed keys.
/// - `charset`: declared in [`LayoutConfig::content_type`] only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawLayoutConfig")]
pub struct LayoutConfig {
    pub schema: SchemaVersion,
    pub location_info: bool,
    pub add_root_throwable: bool,
    pub message_parameters: bool,
    pub user_fields: UserFields,
    pub charset: String,
}

/// Deserialized form; unset options fall back to the schema's defaults.
#[derive(Deserialize)]
struct RawLayoutConfig {
    #[serde(default)]
    schema: SchemaVersion,
    location_info: Option<bool>,
    add_root_throwable: Option<bool>,
    message_parameters: Option<bool>,
    #[serde(default)]
    user_fields: UserFields,
    charset: Option<String>,
}

impl From<RawLayoutConfig> for LayoutConfig {
    fn from(raw: RawLayoutConfig) -> Self {
        let defaults = LayoutConfig::for_schema(raw.schema);
        Self {
            schema: raw.schema,
            location_info: raw.location_info.unwrap_or(defaults.location_info),
            add_root_throwable: raw.add_root_throwable.unwrap_or(defaults.add_root_throwable),
            message_parameters: raw.message_parameters.unwrap_or(defaults.message_parameters),
            user_fields: raw.user_fields,
            charset: raw.charset.unwrap_or(defaults.charset),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::for_schema(SchemaVersion::default())
    }
}

impl LayoutConfig {
    /// Defaults for `schema`.
    pub fn for_schema(schema: SchemaVersion) -> Self {
        Self {
            schema,
            location_info: schema.default_location_info(),
            add_root_throwable: true,
            message_parameters: false,
            user_fields: UserFields::default(),
            charset: "UTF-8".to_string(),
        }
    }

    pub fn legacy() -> Self {
        Self::for_schema(SchemaVersion::Legacy)
    }

    pub fn v1() -> Self {
        Self::for_schema(SchemaVersion::V1)
    }

    pub fn with_location_info(mut self, enabled: bool) -> Self {
        self.location_info = enabled;
        self
    }

    pub fn with_add_root_throwable(mut self, enabled: bool) -> Self {
        self.add_root_throwable = enabled;
        self
    }

    pub fn with_message_parameters(mut self, enabled: bool) -> Self {
        self.message_parameters = enabled;
        self
    }

    pub fn with_user_fields(mut self, fields: impl Into<String>) -> Self {
        self.user_fields = UserFields::parse(&fields.into());
        self
    }

    pub fn content_type(&self) -> String {
        format!("application/json; charset={}", self.charset)
    }

    /// Build a config from the `LOGSTASH_*` environment variables listed in
    /// [`crate::env`]. Unset variables keep the schema's defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let schema = match env_opt(SCHEMA_ENV) {
            Some(s) => s.parse()?,
            None => SchemaVersion::default(),
        };
        let mut config = Self::for_schema(schema);

        if let Some(v) = env_opt(LOCATION_INFO_ENV) {
            config.location_info = parse_bool(LOCATION_INFO_ENV, &v)?;
        }
        if let Some(v) = env_opt(ADD_ROOT_THROWABLE_ENV) {
            config.add_root_throwable = parse_bool(ADD_ROOT_THROWABLE_ENV, &v)?;
        }
        if let Some(v) = env_opt(MESSAGE_PARAMETERS_ENV) {
            config.message_parameters = parse_bool(MESSAGE_PARAMETERS_ENV, &v)?;
        }
        if let Some(v) = env_opt(USER_FIELDS_ENV) {
            config.user_fields = UserFields::parse(&v);
        }
        config.charset = env_or(CHARSET_ENV, &config.charset);

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_defaults() {
        assert!(LayoutConfig::legacy().location_info);
        assert!(!LayoutConfig::v1().location_info);
        assert!(LayoutConfig::default().add_root_throwable);
        assert_eq!(LayoutConfig::default().schema, SchemaVersion::V1);
    }

    #[test]
    fn parses_user_fields() {
        let fields = UserFields::parse("field2:value2,field3:value3");
        let pairs: Vec<_> = fields.iter().collect();
        assert_eq!(pairs, vec![("field2", "value2"), ("field3", "value3")]);
        assert_eq!(fields.to_string(), "field2:value2,field3:value3");
    }

    #[test]
    fn skips_malformed_user_fields() {
        let fields = UserFields::parse("ok:1,broken,too:many:colons,,x:,y::,z:2:,w: ");
        let pairs: Vec<_> = fields.iter().collect();
        assert_eq!(pairs, vec![("ok", "1"), ("z", "2")]);
        assert!(UserFields::parse("level:").is_empty());
    }

    #[test]
    fn content_type_uses_charset() {
        assert_eq!(LayoutConfig::default().content_type(), "application/json; charset=UTF-8");
    }

    #[test]
    fn schema_from_str() {
        assert_eq!("V1".parse::<SchemaVersion>(), Ok(SchemaVersion::V1));
        assert_eq!("legacy".parse::<SchemaVersion>(), Ok(SchemaVersion::Legacy));
        assert!(matches!(
            "v2".parse::<SchemaVersion>(),
            Err(ConfigError::InvalidSchema(_))
        ));
    }

    #[test]
    fn deserializes_from_json() {
        let config: LayoutConfig = serde_json::from_str(
            r#"{"schema": "legacy", "add_root_throwable": false, "user_fields": "application:demo"}"#,
        )
        .unwrap();
        assert_eq!(config.schema, SchemaVersion::Legacy);
        assert!(config.location_info);
        assert!(!config.add_root_throwable);
        assert_eq!(config.user_fields.iter().next(), Some(("application", "demo")));
        assert_eq!(config.charset, "UTF-8");

        let config: LayoutConfig = serde_json::from_str(
            r#"{"user_fields": [{"key": "instance", "value": "7"}]}"#,
        )
        .unwrap();
        assert_eq!(config.user_fields.len(), 1);
        assert!(!config.location_info);
    }
}
