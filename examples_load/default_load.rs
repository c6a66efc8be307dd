use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use logstash_event_layout::init::init_tracing;
use logstash_event_layout::memory_sink::MemorySink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = MemorySink::new();
    let _handle = init_tracing(Arc::new(sink.clone()))?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        info!(iteration = i, "default load test event");
    }

    let elapsed = start.elapsed();
    println!("default config: mapped {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Give the background task a little time to drain the channel
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    println!("sink received {} lines", sink.len());
    if let Some(first) = sink.lines().first() {
        print!("first line: {}", first);
    }
    Ok(())
}
