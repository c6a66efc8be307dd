use crate::sink::LogSink;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::error::Error;
use std::sync::Arc;

/// A sink that keeps every line in memory.
///
/// Clones share the same buffer, so a test can hand one clone to the layer
/// and inspect the other.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines received so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn send(&self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}
