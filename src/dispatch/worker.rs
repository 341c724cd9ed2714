//! Delivery workers: drain the queue into a broker sink.
//!
//! Each worker dequeues, attempts one send under a timeout, and on failure
//! re-enqueues the message at the tail after a capped exponential delay.
//! With no attempt ceiling configured a message is redelivered until it
//! lands; retried messages occupy queue capacity and a worker slot on every
//! cycle, so a saturated queue full of poisoned messages throttles intake
//! rather than dropping data.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::DispatchConfig;

use super::{BrokerSink, DispatchError, DispatchQueue};

/// Initial redelivery delay after a failed attempt.
const INITIAL_REDELIVERY_DELAY: Duration = Duration::from_millis(100);
/// Redelivery delay cap.
const MAX_REDELIVERY_DELAY: Duration = Duration::from_secs(5);

/// Tuning for a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Number of concurrent delivery workers.
    pub workers: usize,
    /// Per-attempt send timeout.
    pub send_timeout: Duration,
    /// Optional delivery attempt ceiling; `None` redelivers indefinitely.
    pub max_attempts: Option<u32>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            send_timeout: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl WorkerOptions {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            workers: config.workers,
            send_timeout: Duration::from_secs(config.send_timeout_secs),
            max_attempts: config.max_attempts,
        }
    }
}

/// Handle over the spawned delivery workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Launch `options.workers` identical workers over the shared queue.
    pub fn spawn(queue: DispatchQueue, sink: Arc<dyn BrokerSink>, options: WorkerOptions) -> Self {
        let handles = (0..options.workers)
            .map(|worker| {
                let queue = queue.clone();
                let sink = Arc::clone(&sink);
                let options = options.clone();
                tokio::spawn(async move { worker_loop(worker, queue, sink, options).await })
            })
            .collect();
        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to drain and exit.
    pub async fn join(self) {
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                error!(error = %e, "dispatch worker panicked");
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    queue: DispatchQueue,
    sink: Arc<dyn BrokerSink>,
    options: WorkerOptions,
) {
    while let Some(mut message) = queue.dequeue().await {
        message.attempts += 1;

        let outcome = tokio::time::timeout(
            options.send_timeout,
            sink.send(&message.topic, message.key.as_deref(), &message.payload),
        )
        .await;

        let err = match outcome {
            Ok(Ok(())) => {
                debug!(
                    worker,
                    message_id = %message.id,
                    topic = %message.topic,
                    attempts = message.attempts,
                    "message delivered"
                );
                continue;
            }
            Ok(Err(e)) => e,
            Err(_) => DispatchError::Timeout(options.send_timeout),
        };

        warn!(
            worker,
            message_id = %message.id,
            topic = %message.topic,
            attempts = message.attempts,
            error = %err,
            "delivery failed"
        );

        if let Some(max) = options.max_attempts {
            if message.attempts >= max {
                error!(
                    worker,
                    message_id = %message.id,
                    topic = %message.topic,
                    attempts = message.attempts,
                    "dropping message after reaching the attempt ceiling"
                );
                continue;
            }
        }

        tokio::time::sleep(redelivery_delay(message.attempts)).await;

        // A worker never requeues once the queue has closed; anything
        // dequeued but undelivered at shutdown is lost.
        if queue.enqueue(message).await.is_err() {
            warn!(worker, "queue closed during redelivery, message dropped");
        }
    }

    debug!(worker, "dispatch worker drained and stopped");
}

/// Capped exponential delay derived from the attempt count.
fn redelivery_delay(attempts: u32) -> Duration {
    let factor = attempts.saturating_sub(1).min(16);
    std::cmp::min(
        INITIAL_REDELIVERY_DELAY * 2u32.saturating_pow(factor),
        MAX_REDELIVERY_DELAY,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redelivery_delay_doubles_then_caps() {
        assert_eq!(redelivery_delay(1), Duration::from_millis(100));
        assert_eq!(redelivery_delay(2), Duration::from_millis(200));
        assert_eq!(redelivery_delay(3), Duration::from_millis(400));
        assert_eq!(redelivery_delay(7), MAX_REDELIVERY_DELAY);
        assert_eq!(redelivery_delay(u32::MAX), MAX_REDELIVERY_DELAY);
    }
}
