//! In-process broadcast sink for standalone mode.
//!
//! Delivered records fan out over a tokio broadcast channel to any live
//! subscribers. Ideal for local development and tests that want to observe
//! the event stream without an external broker.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{BrokerSink, Result};

/// Broadcast capacity; slow subscribers miss older records past this.
const CHANNEL_CAPACITY: usize = 1024;

/// A record as delivered to the sink.
#[derive(Debug, Clone)]
pub struct DispatchedRecord {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// In-process broker sink over a tokio broadcast channel.
pub struct ChannelSink {
    sender: broadcast::Sender<DispatchedRecord>,
}

impl ChannelSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        info!("channel sink initialized");
        Self { sender }
    }

    /// Subscribe to everything delivered from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchedRecord> {
        self.sender.subscribe()
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerSink for ChannelSink {
    async fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<()> {
        let record = DispatchedRecord {
            topic: topic.to_string(),
            key: key.map(str::to_string),
            payload: payload.to_vec(),
        };
        // No live subscribers is not a delivery failure for an in-process sink.
        let receivers = self.sender.send(record).unwrap_or(0);
        debug!(topic, receivers, "record broadcast");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_record() {
        let sink = ChannelSink::new();
        let mut rx = sink.subscribe();

        sink.send("a.topic", Some("k"), b"body").await.unwrap();

        let record = rx.recv().await.unwrap();
        assert_eq!(record.topic, "a.topic");
        assert_eq!(record.key.as_deref(), Some("k"));
        assert_eq!(record.payload, b"body");
    }

    #[tokio::test]
    async fn test_send_without_subscribers_is_ok() {
        let sink = ChannelSink::new();
        assert!(sink.send("a.topic", None, b"body").await.is_ok());
    }
}
