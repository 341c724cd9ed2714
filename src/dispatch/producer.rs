//! Producer facade owning the dispatch pipeline.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::config::DispatchConfig;
use crate::domain::CatalogEvent;

use super::{
    BrokerSink, DispatchError, DispatchQueue, Message, Result, WorkerOptions, WorkerPool,
};

/// Entry point business code uses to emit messages.
///
/// Owns the queue and the worker pool outright; dropping or closing the
/// dispatcher tears the whole pipeline down. There is no global instance:
/// whoever constructs it decides its lifetime.
pub struct Dispatcher {
    queue: DispatchQueue,
    pool: Mutex<Option<WorkerPool>>,
    topic_prefix: String,
}

impl Dispatcher {
    /// Start the pipeline: queue plus workers over the given sink.
    pub fn start(sink: Arc<dyn BrokerSink>, config: &DispatchConfig) -> Self {
        let queue = DispatchQueue::bounded(config.queue_capacity);
        let options = WorkerOptions::from_config(config);
        let pool = WorkerPool::spawn(queue.clone(), sink, options);

        info!(
            workers = config.workers,
            capacity = config.queue_capacity,
            sink = %config.sink,
            "dispatch pipeline started"
        );

        Self {
            queue,
            pool: Mutex::new(Some(pool)),
            topic_prefix: config.topic_prefix.clone(),
        }
    }

    /// Hand a message to the pipeline.
    ///
    /// This is an asynchronous handoff: the call suspends only while the
    /// queue is at capacity and never waits on broker I/O. Delivery failures
    /// are retried by the workers and are not observable here.
    pub async fn produce(
        &self,
        topic: impl Into<String>,
        key: Option<String>,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.queue.enqueue(Message::new(topic, key, payload)).await
    }

    /// Serialize a catalog event and dispatch it on its derived topic.
    pub async fn publish_event(&self, event: &CatalogEvent) -> Result<()> {
        let topic = format!("{}.events.{}", self.topic_prefix, event.domain());
        let payload =
            serde_json::to_vec(event).map_err(|e| DispatchError::Payload(e.to_string()))?;
        self.queue
            .enqueue(Message::new(topic, Some(event.key()), payload))
            .await
    }

    /// Stop admission, drain buffered messages, and join the workers.
    ///
    /// Idempotent. Once this returns no further background sends occur.
    pub async fn close(&self) {
        self.queue.close().await;
        let pool = self.pool.lock().await.take();
        if let Some(pool) = pool {
            info!(workers = pool.size(), "dispatch queue closed, draining");
            pool.join().await;
            info!("dispatch pipeline stopped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::super::MockSink;
    use super::*;

    fn pipeline_config() -> DispatchConfig {
        DispatchConfig {
            queue_capacity: 16,
            workers: 2,
            ..DispatchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_produce_and_drain() {
        let sink = Arc::new(MockSink::new());
        let dispatcher = Dispatcher::start(sink.clone(), &pipeline_config());

        dispatcher
            .produce("orders.test", None, b"payload".to_vec())
            .await
            .unwrap();
        dispatcher.close().await;

        let sent = sink.take_sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "orders.test");
        assert_eq!(sent[0].payload, b"payload");
    }

    #[tokio::test]
    async fn test_publish_event_derives_topic_and_key() {
        let sink = Arc::new(MockSink::new());
        let dispatcher = Dispatcher::start(sink.clone(), &pipeline_config());

        let event = CatalogEvent::ProductCreated {
            product_id: 7,
            seller_id: 3,
            name: "lamp".into(),
            price_cents: 1500,
        };
        dispatcher.publish_event(&event).await.unwrap();
        dispatcher.close().await;

        let sent = sink.take_sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "bazaar.events.product");
        assert_eq!(sent[0].key.as_deref(), Some("7"));
        let decoded: CatalogEvent = serde_json::from_slice(&sent[0].payload).unwrap();
        assert_eq!(decoded, event);
    }

    #[tokio::test]
    async fn test_produce_after_close_errors() {
        let sink = Arc::new(MockSink::new());
        let dispatcher = Dispatcher::start(sink, &pipeline_config());

        dispatcher.close().await;
        assert!(dispatcher.is_closed());

        let err = dispatcher
            .produce("orders.test", None, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Closed));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let sink = Arc::new(MockSink::new());
        let dispatcher = Dispatcher::start(sink, &pipeline_config());
        dispatcher.close().await;
        dispatcher.close().await;
    }
}
