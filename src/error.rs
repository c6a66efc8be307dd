/// Error type returned when turning a mapped event into text or when
/// installing the layout as the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum LayoutError {
    /// The field record could not be rendered as JSON. Every value in a
    /// record is plain JSON data, so this indicates a bug rather than bad
    /// input.
    #[error("failed to serialize log event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to install global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Error type returned when reading a [`LayoutConfig`](crate::config::LayoutConfig)
/// from strings or the environment.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown schema version {0:?}, expected \"legacy\" or \"v1\"")]
    InvalidSchema(String),

    #[error("invalid boolean for {key}: {value:?}")]
    InvalidBool { key: String, value: String },
}
