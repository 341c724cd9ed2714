//! End-to-end tests of the dispatch pipeline: producer facade, bounded
//! queue, worker pool, and sink, wired the way the server wires them.
//!
//! Run with: cargo test --test dispatch_pipeline

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bazaar::config::DispatchConfig;
use bazaar::dispatch::{BrokerSink, DispatchError, Dispatcher, MockSink};
use tokio::sync::RwLock;

fn pipeline_config(workers: usize, queue_capacity: usize) -> DispatchConfig {
    DispatchConfig {
        workers,
        queue_capacity,
        send_timeout_secs: 1,
        ..DispatchConfig::default()
    }
}

async fn wait_for_sent(sink: &MockSink, expected: usize) {
    for _ in 0..200 {
        if sink.sent_count().await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "sink received {} of {} expected messages",
        sink.sent_count().await,
        expected
    );
}

#[tokio::test]
async fn drains_more_messages_than_queue_capacity() {
    let sink = Arc::new(MockSink::new());
    let dispatcher = Dispatcher::start(
        sink.clone() as Arc<dyn BrokerSink>,
        &pipeline_config(4, 8),
    );

    // Producers outpace the capacity; enqueue suspends instead of failing.
    for n in 0..50u32 {
        dispatcher
            .produce("orders", Some(n.to_string()), vec![n as u8])
            .await
            .unwrap();
    }
    dispatcher.close().await;

    let sent = sink.take_sent().await;
    assert_eq!(sent.len(), 50);
    assert!(sent.iter().all(|record| record.topic == "orders"));
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_is_retried_until_it_lands() {
    let sink = Arc::new(MockSink::new());
    sink.fail_times(3).await;
    let dispatcher = Dispatcher::start(
        sink.clone() as Arc<dyn BrokerSink>,
        &pipeline_config(1, 8),
    );

    dispatcher.produce("orders", None, b"m".to_vec()).await.unwrap();
    wait_for_sent(&sink, 1).await;

    // Three failures plus the delivery.
    assert_eq!(sink.attempt_count().await, 4);
    dispatcher.close().await;
}

#[tokio::test(start_paused = true)]
async fn attempt_ceiling_drops_poisoned_messages() {
    let sink = Arc::new(MockSink::new());
    sink.set_fail_always(true).await;
    let config = DispatchConfig {
        max_attempts: Some(3),
        ..pipeline_config(1, 8)
    };
    let dispatcher = Dispatcher::start(sink.clone() as Arc<dyn BrokerSink>, &config);

    dispatcher.produce("orders", None, b"bad".to_vec()).await.unwrap();
    for _ in 0..200 {
        if sink.attempt_count().await >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(sink.attempt_count().await, 3);
    dispatcher.close().await;

    // Dropped, not delivered, and not retried past the ceiling.
    assert_eq!(sink.sent_count().await, 0);
    assert_eq!(sink.attempt_count().await, 3);
}

#[tokio::test(start_paused = true)]
async fn unbounded_redelivery_cycles_until_shutdown() {
    let sink = Arc::new(MockSink::new());
    sink.set_fail_always(true).await;
    // Default policy: no ceiling, a live message is never dropped.
    let dispatcher = Dispatcher::start(
        sink.clone() as Arc<dyn BrokerSink>,
        &pipeline_config(1, 8),
    );

    dispatcher.produce("orders", None, b"stuck".to_vec()).await.unwrap();
    for _ in 0..200 {
        if sink.attempt_count().await >= 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(sink.attempt_count().await >= 5);

    // close() still drains: the next re-enqueue lands on a closed queue,
    // the message is dropped there, and the worker sees the closed signal.
    dispatcher.close().await;
    assert_eq!(sink.sent_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn redelivery_goes_to_the_tail() {
    let sink = Arc::new(MockSink::new());
    // The first send attempt (the first message) fails once.
    sink.fail_times(1).await;
    let dispatcher = Dispatcher::start(
        sink.clone() as Arc<dyn BrokerSink>,
        &pipeline_config(1, 8),
    );

    dispatcher.produce("orders", None, b"first".to_vec()).await.unwrap();
    dispatcher.produce("orders", None, b"second".to_vec()).await.unwrap();
    dispatcher.produce("orders", None, b"third".to_vec()).await.unwrap();
    wait_for_sent(&sink, 3).await;
    dispatcher.close().await;

    let payloads: Vec<Vec<u8>> = sink
        .take_sent()
        .await
        .into_iter()
        .map(|record| record.payload)
        .collect();
    // The failed first message re-enters behind the other two.
    assert_eq!(payloads, vec![b"second".to_vec(), b"third".to_vec(), b"first".to_vec()]);
}

/// Sink whose first calls hang far past the per-attempt timeout.
#[derive(Default)]
struct StallingSink {
    stalls_remaining: RwLock<u32>,
    calls: RwLock<u32>,
    delivered: RwLock<Vec<Vec<u8>>>,
}

#[async_trait]
impl BrokerSink for StallingSink {
    async fn send(
        &self,
        _topic: &str,
        _key: Option<&str>,
        payload: &[u8],
    ) -> Result<(), DispatchError> {
        *self.calls.write().await += 1;
        {
            let mut stalls = self.stalls_remaining.write().await;
            if *stalls > 0 {
                *stalls -= 1;
                drop(stalls);
                // Far longer than any send timeout; the worker cancels us.
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
        self.delivered.write().await.push(payload.to_vec());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_send_times_out_and_is_redelivered() {
    let sink = Arc::new(StallingSink {
        stalls_remaining: RwLock::new(1),
        ..StallingSink::default()
    });
    let dispatcher = Dispatcher::start(
        sink.clone() as Arc<dyn BrokerSink>,
        &pipeline_config(1, 8),
    );

    dispatcher.produce("orders", None, b"slow".to_vec()).await.unwrap();
    for _ in 0..200 {
        if !sink.delivered.read().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    dispatcher.close().await;

    assert_eq!(*sink.delivered.read().await, vec![b"slow".to_vec()]);
    // One timed-out attempt, one delivery.
    assert_eq!(*sink.calls.read().await, 2);
}

#[tokio::test]
async fn produce_after_close_is_rejected() {
    let sink = Arc::new(MockSink::new());
    let dispatcher = Dispatcher::start(
        sink.clone() as Arc<dyn BrokerSink>,
        &pipeline_config(2, 8),
    );

    dispatcher.produce("orders", None, b"m".to_vec()).await.unwrap();
    dispatcher.close().await;

    let err = dispatcher
        .produce("orders", None, b"late".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Closed));

    // The message accepted before close was still delivered.
    assert_eq!(sink.sent_count().await, 1);
}
