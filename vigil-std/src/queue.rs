//! Bounded, closable multi-producer multi-consumer queue.
//!
//! [`Queue`] is shared by the production path (events) and the testing path
//! (pending test requests). Producers get backpressure when the queue is full;
//! consumers block until an item arrives. [`Queue::close`] wakes everyone:
//! blocked producers fail, consumers drain what is left and then fail.
//!
//! Built on `crossbeam` channels. The queue owns both ends of its data channel,
//! so closing is signalled through a second, never-written channel whose
//! sender is dropped on close.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use crossbeam::select;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors returned by queue operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was closed.
    #[error("queue is closed")]
    Closed,
}

/// A bounded FIFO queue with close semantics.
pub struct Queue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    closed: AtomicBool,
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
    capacity: usize,
}

impl<T> Queue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = channel::bounded(capacity);
        let (close_tx, close_rx) = channel::bounded(0);
        Self {
            tx,
            rx,
            closed: AtomicBool::new(false),
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
            capacity,
        }
    }

    /// Push an item, blocking while the queue is full.
    ///
    /// Fails with [`QueueError::Closed`] if the queue is or becomes closed;
    /// the item is dropped in that case.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        select! {
            send(self.tx, item) -> res => res.map_err(|_| QueueError::Closed),
            recv(self.close_rx) -> _ => Err(QueueError::Closed),
        }
    }

    /// Pop an item, blocking until one is available.
    ///
    /// After [`close`](Self::close) remaining items are still returned; once
    /// the queue is empty this fails with [`QueueError::Closed`].
    pub fn pop(&self) -> Result<T, QueueError> {
        match self.rx.try_recv() {
            Ok(item) => return Ok(item),
            Err(TryRecvError::Disconnected) => return Err(QueueError::Closed),
            Err(TryRecvError::Empty) => {}
        }
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        select! {
            recv(self.rx) -> item => item.map_err(|_| QueueError::Closed),
            recv(self.close_rx) -> _ => self.rx.try_recv().map_err(|_| QueueError::Closed),
        }
    }

    /// Pop an item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Close the queue, waking every blocked producer and consumer.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the sender disconnects `close_rx` for every waiter.
        self.close_tx.lock().take();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
