//! Dispatch probe: pushes numbered messages through the configured sink.
//!
//! Handy for checking broker connectivity and watching pipeline logs
//! without running the full server. `BAZAAR_PROBE_COUNT` sets how many
//! messages to send (default 5).

use std::sync::Arc;

use bazaar::config::Config;
use bazaar::dispatch::{init_sink, Dispatcher};
use bazaar::utils::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("bazaar-dispatch");
    let config = Config::load(None)?;

    let count: usize = std::env::var("BAZAAR_PROBE_COUNT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(5);

    let sink = init_sink(&config.dispatch)?;
    let dispatcher = Arc::new(Dispatcher::start(sink, &config.dispatch));

    let topic = format!("{}.probe", config.dispatch.topic_prefix);
    for n in 0..count {
        let payload = format!("probe message {}", n).into_bytes();
        dispatcher
            .produce(topic.clone(), Some(n.to_string()), payload)
            .await?;
    }
    info!(count, %topic, "probe messages enqueued, draining");
    dispatcher.close().await;
    info!("dispatch probe complete");
    Ok(())
}
