use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for JSON lines produced by
/// [`LogstashLayer`](crate::layer::LogstashLayer).
///
/// Implementations are responsible for transporting lines to a concrete
/// destination (file, socket, log shipper). The layer calls `send` from a
/// background task and never awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single formatted event.
    ///
    /// **Parameters**
    /// - `line`: one JSON object terminated by `\n`.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was accepted.
    /// - `Err(..)` if the destination failed. The layer treats this as a
    ///   transient failure and retries the batch with backoff.
    async fn send(&self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered lines, if the destination buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
