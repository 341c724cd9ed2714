//! Asynchronous event dispatch pipeline.
//!
//! Business code hands messages to a [`Dispatcher`], which enqueues them on
//! a bounded FIFO [`DispatchQueue`] and returns immediately. A fixed
//! [`WorkerPool`] drains the queue and delivers each message to a
//! [`BrokerSink`] with a per-attempt timeout; failed deliveries are
//! re-enqueued at the tail, giving at-least-once semantics. Closing the
//! dispatcher stops admission, drains what is buffered, and joins the
//! workers.
//!
//! Delivery order across workers is not global: the queue is FIFO, but
//! concurrent workers may complete sends out of order. Per-key ordering is
//! delegated to keyed sinks (Kafka partitions by the message key).

#[cfg(feature = "channel")]
pub mod channel;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod mock;
pub mod producer;
pub mod queue;
pub mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;

use crate::config::DispatchConfig;

#[cfg(feature = "channel")]
pub use channel::{ChannelSink, DispatchedRecord};
#[cfg(feature = "kafka")]
pub use kafka::KafkaSink;
pub use mock::MockSink;
pub use producer::Dispatcher;
pub use queue::DispatchQueue;
pub use worker::{WorkerOptions, WorkerPool};

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors that can occur in the dispatch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The queue no longer accepts messages.
    #[error("dispatch queue is closed")]
    Closed,

    /// A single delivery attempt exceeded its timeout.
    #[error("send timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The sink rejected or failed the delivery.
    #[error("broker send failed: {0}")]
    Send(String),

    /// The sink could not be reached or created.
    #[error("broker connection failed: {0}")]
    Connection(String),

    /// The payload could not be serialized.
    #[error("payload serialization failed: {0}")]
    Payload(String),
}

/// A message travelling through the pipeline.
#[derive(Debug, Clone)]
pub struct Message {
    /// Stable id for tracing a message across redeliveries.
    pub id: Uuid,
    pub topic: String,
    /// Partition key for keyed sinks.
    pub key: Option<String>,
    pub payload: Vec<u8>,
    /// Delivery attempts so far; incremented by workers.
    pub attempts: u32,
}

impl Message {
    pub fn new(topic: impl Into<String>, key: Option<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            key,
            payload,
            attempts: 0,
        }
    }
}

/// Terminal delivery target for dispatched messages.
///
/// Implementations:
/// - `KafkaSink`: production broker (feature `kafka`)
/// - `ChannelSink`: in-process broadcast for standalone mode
/// - `MockSink`: recording sink for tests
#[async_trait]
pub trait BrokerSink: Send + Sync {
    /// Deliver one payload. Errors are retried by the worker pool.
    async fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<()>;
}

/// Initialize the broker sink named by the configuration.
pub fn init_sink(config: &DispatchConfig) -> std::result::Result<Arc<dyn BrokerSink>, Box<dyn std::error::Error>> {
    match config.sink.as_str() {
        #[cfg(feature = "channel")]
        "channel" => Ok(Arc::new(ChannelSink::new())),
        #[cfg(not(feature = "channel"))]
        "channel" => {
            error!("channel sink requested but 'channel' feature is not enabled");
            Err("channel feature not enabled".into())
        }
        #[cfg(feature = "kafka")]
        "kafka" => {
            let kafka = config
                .kafka
                .as_ref()
                .ok_or("dispatch.kafka settings are required for the kafka sink")?;
            Ok(Arc::new(KafkaSink::new(kafka)?))
        }
        #[cfg(not(feature = "kafka"))]
        "kafka" => {
            error!("Kafka sink requested but 'kafka' feature is not enabled");
            Err("kafka feature not enabled".into())
        }
        other => {
            error!("Unknown sink type: {}", other);
            Err(format!("unknown sink type: {}", other).into())
        }
    }
}
