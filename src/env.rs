//! Environment variable names used to configure the layout from the
//! process environment.
//!
//! [`LayoutConfig::from_env`](crate::config::LayoutConfig::from_env) reads
//! all of them once. [`USER_FIELDS_ENV`] is additionally consulted on every
//! mapped event and, when set, replaces the configured user fields.

/// Schema version, `legacy` or `v1`.
pub const SCHEMA_ENV: &str = "LOGSTASH_LAYOUT_SCHEMA";

/// Whether to emit call-site location fields.
pub const LOCATION_INFO_ENV: &str = "LOGSTASH_LAYOUT_LOCATION_INFO";

/// Whether to emit `root_*` exception fields.
pub const ADD_ROOT_THROWABLE_ENV: &str = "LOGSTASH_LAYOUT_ADD_ROOT_THROWABLE";

/// Whether to emit `message_parameters` for parameterized messages.
pub const MESSAGE_PARAMETERS_ENV: &str = "LOGSTASH_LAYOUT_MESSAGE_PARAMETERS";

/// Declared output charset.
pub const CHARSET_ENV: &str = "LOGSTASH_LAYOUT_CHARSET";

/// Static user fields, `key:value,key2:value2`.
pub const USER_FIELDS_ENV: &str = "LOGSTASH_USER_FIELDS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating unset and non-unicode values
/// as absent.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
