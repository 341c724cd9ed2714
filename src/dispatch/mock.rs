//! Mock broker sink for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BrokerSink, DispatchError, Result};

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Mock sink that records deliveries and can inject failures.
#[derive(Default)]
pub struct MockSink {
    sent: RwLock<Vec<SentRecord>>,
    attempts: RwLock<u32>,
    fail_always: RwLock<bool>,
    fail_remaining: RwLock<u32>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send until turned off again.
    pub async fn set_fail_always(&self, fail: bool) {
        *self.fail_always.write().await = fail;
    }

    /// Fail exactly the next `times` sends, then succeed.
    pub async fn fail_times(&self, times: u32) {
        *self.fail_remaining.write().await = times;
    }

    /// Total send calls observed, successful or not.
    pub async fn attempt_count(&self) -> u32 {
        *self.attempts.read().await
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }

    pub async fn take_sent(&self) -> Vec<SentRecord> {
        std::mem::take(&mut *self.sent.write().await)
    }
}

#[async_trait]
impl BrokerSink for MockSink {
    async fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<()> {
        *self.attempts.write().await += 1;

        if *self.fail_always.read().await {
            return Err(DispatchError::Send("mock send failure".to_string()));
        }
        {
            let mut remaining = self.fail_remaining.write().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DispatchError::Send("mock send failure".to_string()));
            }
        }

        self.sent.write().await.push(SentRecord {
            topic: topic.to_string(),
            key: key.map(str::to_string),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_sends() {
        let sink = MockSink::new();
        sink.send("t", Some("k"), b"p").await.unwrap();

        assert_eq!(sink.sent_count().await, 1);
        assert_eq!(sink.attempt_count().await, 1);
        let sent = sink.take_sent().await;
        assert_eq!(sent[0].topic, "t");
        assert_eq!(sink.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_fail_times_then_succeeds() {
        let sink = MockSink::new();
        sink.fail_times(2).await;

        assert!(sink.send("t", None, b"p").await.is_err());
        assert!(sink.send("t", None, b"p").await.is_err());
        assert!(sink.send("t", None, b"p").await.is_ok());
        assert_eq!(sink.attempt_count().await, 3);
        assert_eq!(sink.sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_fail_always() {
        let sink = MockSink::new();
        sink.set_fail_always(true).await;
        assert!(sink.send("t", None, b"p").await.is_err());
        sink.set_fail_always(false).await;
        assert!(sink.send("t", None, b"p").await.is_ok());
    }
}
