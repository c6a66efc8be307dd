use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{error, info_span};

use logstash_event_layout::init::{init_tracing_with_config, LayerConfig};
use logstash_event_layout::memory_sink::MemorySink;
use logstash_event_layout::LayoutConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = MemorySink::new();

    let layer_config = LayerConfig {
        channel_buffer: 50_000,
        batch_size: 1_000,
        flush_interval: Duration::from_millis(200),
        enable_stdout: false,
        layout: LayoutConfig::legacy()
            .with_location_info(true)
            .with_user_fields("application:custom_load,instance:1"),
    };

    let _handle = init_tracing_with_config(Arc::new(sink.clone()), layer_config)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    {
        let span = info_span!("load");
        let _guard = span.enter();
        for i in 0..n {
            let err = std::io::Error::other(format!("simulated failure {}", i));
            error!(error = &err as &(dyn std::error::Error + 'static), iteration = i, "custom load test error");
        }
    }

    let elapsed = start.elapsed();
    println!("custom config: mapped {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    sleep(Duration::from_secs(2)).await;
    println!("sink received {} lines", sink.len());
    Ok(())
}
