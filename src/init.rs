use crate::config::LayoutConfig;
use crate::error::LayoutError;
use crate::layer::LogstashLayer;
use crate::mapper::EventMapper;
use crate::sink::LogSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging layer.
///
/// Controls the internal buffer size, the maximum batch size handed to
/// the sink, how often a partial batch is forced out, whether events are
/// also printed through the `fmt` layer, and the JSON layout itself.
///
/// **Fields**
/// - `channel_buffer`: maximum number of lines queued before new lines
///   are dropped.
/// - `batch_size`: batch size for sending to the sink.
/// - `flush_interval`: maximum interval between flushes, even for a
///   partial batch.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top of [`LogstashLayer`].
/// - `layout`: [`LayoutConfig`] for the emitted JSON.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub enable_stdout: bool,
    pub layout: LayoutConfig,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            enable_stdout: false,
            layout: LayoutConfig::default(),
        }
    }
}

/// Initialize the global `tracing` subscriber using the provided sink and
/// [`LayerConfig`].
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that will receive one JSON
///   line per event.
/// - `config`: [`LayerConfig`] controlling buffering, batching and the
///   JSON layout.
///
/// **Returns**
/// - The handle of the background delivery task.
/// - `Err(LayoutError::Subscriber)` if a global subscriber is already set.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, LayoutError> {
    let mapper = EventMapper::new(config.layout);
    let (layer, handle) = LogstashLayer::new(
        sink,
        mapper,
        config.channel_buffer,
        config.batch_size,
        config.flush_interval,
    );

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(handle)
}

/// Initialize tracing with [`LayerConfig::default`], i.e. the V1 schema
/// and no console output.
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<JoinHandle<()>, LayoutError> {
    init_tracing_with_config(sink, LayerConfig::default())
}
