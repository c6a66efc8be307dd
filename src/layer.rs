use crate::mapper::EventMapper;
use crate::record::{Level, Location, LogEvent};
use crate::sink::LogSink;
use crate::throwable::ThrowableChain;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that captures events as [`LogEvent`]s,
/// renders them with an [`EventMapper`] and forwards the JSON lines to an
/// asynchronous [`LogSink`] via a bounded channel and background task.
///
/// Mapping happens on the application thread; sink I/O never does.
pub struct LogstashLayer {
    mapper: Arc<EventMapper>,
    sender: mpsc::Sender<String>,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Lines taken off the channel by the background task.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full or the event did not serialize.
    pub dropped_events: Arc<AtomicU64>,
}

impl LogstashLayer {
    /// Create a new layer and spawn a background task that pulls lines
    /// from a bounded channel and sends them to the provided [`LogSink`].
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations. The task
    /// drains, flushes the sink and exits once the layer is dropped.
    pub fn new(
        sink: Arc<dyn LogSink>,
        mapper: EventMapper,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<String>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let enqueued_events_bg = Arc::clone(&enqueued_events);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let backoff = Duration::from_millis(100);
            let max_backoff = Duration::from_secs(10);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(line) => {
                            batch.push(line);
                            enqueued_events_bg.fetch_add(1, Ordering::Relaxed);
                            if batch.len() >= batch_size {
                                if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff).await {
                                    eprintln!("error sending log batch: {}", e);
                                }
                            }
                        }
                        None => {
                            if !batch.is_empty() {
                                if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff).await {
                                    eprintln!("error sending final log batch: {}", e);
                                }
                            }
                            if let Err(e) = sink.flush().await {
                                eprintln!("error flushing log sink: {}", e);
                            }
                            break;
                        }
                    },
                    _ = sleep(flush_interval) => {
                        if !batch.is_empty() {
                            if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff).await {
                                eprintln!("error flushing log batch: {}", e);
                            }
                        }
                    }
                }
            }
        });

        (Self {
            mapper: Arc::new(mapper),
            sender: tx,
            total_events,
            enqueued_events,
            dropped_events,
        }, handle)
    }

    pub fn mapper(&self) -> &EventMapper {
        &self.mapper
    }

    fn capture<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> LogEvent
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let mut log_event = LogEvent::new(
            meta.target(),
            Level::from(*meta.level()),
            visitor.message.unwrap_or_default(),
        );
        log_event.mdc = visitor.mdc;
        log_event.thrown = visitor.thrown;
        log_event.ndc = ctx
            .event_scope(event)
            .map(|scope| scope.from_root().map(|span| span.name().to_string()).collect())
            .unwrap_or_default();

        if meta.file().is_some() || meta.line().is_some() || meta.module_path().is_some() {
            log_event.location = Some(Location {
                file: meta.file().map(str::to_string),
                line: meta.line(),
                class: meta.module_path().map(str::to_string),
                method: None,
            });
        }
        log_event
    }
}

async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<String>,
    mut backoff: Duration,
    max_backoff: Duration,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let mut last_err: Option<Box<dyn Error + Send + Sync>> = None;
        let mut sent = 0;
        for line in batch.iter() {
            if let Err(e) = sink.send(line).await {
                last_err = Some(e);
                break;
            }
            sent += 1;
        }
        batch.drain(..sent);

        if last_err.is_none() {
            return Ok(());
        }

        eprintln!("log sink send failed, retrying in {:?}", backoff);
        sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, max_backoff);
    }
}

impl<S> Layer<S> for LogstashLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let log_event = self.capture(event, &ctx);
        let line = match self.mapper.format(&log_event) {
            Ok(line) => line,
            Err(e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("dropping unserializable log event: {}", e);
                return;
            }
        };

        if let Err(_e) = self.sender.try_send(line) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            eprintln!("log channel full, dropping log line");
        }
    }
}

/// Collects the fields of one `tracing` event: `message` becomes the
/// message, an error value becomes the throwable chain, everything else
/// lands in the MDC in string form.
#[derive(Default)]
pub struct EventVisitor {
    pub message: Option<String>,
    pub mdc: BTreeMap<String, String>,
    pub thrown: Option<ThrowableChain>,
}

impl EventVisitor {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.mdc.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.thrown.is_none() {
            self.thrown = Some(ThrowableChain::from_dyn_error(value));
        } else {
            self.put(field, value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}
