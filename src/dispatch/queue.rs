//! Bounded FIFO queue shared by producers and delivery workers.
//!
//! Built on a tokio mpsc channel with the receiver behind an async mutex so
//! several workers can take turns dequeuing. Closing the queue stops
//! admission immediately while leaving buffered messages consumable; a
//! `None` from [`DispatchQueue::dequeue`] is the terminal drained signal.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use super::{DispatchError, Message, Result};

/// Bounded multi-producer, multi-worker FIFO queue.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<Message>,
    rx: Arc<Mutex<mpsc::Receiver<Message>>>,
    capacity: usize,
}

impl DispatchQueue {
    /// Create a queue with a fixed capacity. Capacity must be nonzero;
    /// configuration validation enforces this before construction.
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            capacity,
        }
    }

    /// Append a message at the tail.
    ///
    /// Suspends the caller only while the queue is at capacity. Fails with
    /// [`DispatchError::Closed`] once the queue is closed, including callers
    /// already suspended at close time.
    pub async fn enqueue(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| DispatchError::Closed)
    }

    /// Remove the message at the head, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub async fn dequeue(&self) -> Option<Message> {
        self.rx.lock().await.recv().await
    }

    /// Stop accepting new messages. Idempotent; buffered messages remain
    /// consumable until drained.
    pub async fn close(&self) {
        self.rx.lock().await.close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
