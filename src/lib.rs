pub mod config;
pub mod embedded;
pub mod env;
pub mod error;
pub mod host;
pub mod mapper;
pub mod record;
pub mod template;
pub mod throwable;

pub mod sink;
pub mod memory_sink;
pub mod layer;
pub mod init;

pub use config::{LayoutConfig, SchemaVersion, UserFields};
pub use error::{ConfigError, LayoutError};
pub use mapper::{format_timestamp, EventMapper, FieldRecord};
pub use record::{Level, Location, LogEvent, Payload};
pub use template::MapMessage;
pub use throwable::{ThrowableChain, ThrowableNode};
