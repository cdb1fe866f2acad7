//! Shared buffer for the write-behind batch pipeline.
//!
//! An explicit, constructor-injected component — never a process-wide
//! static. Many consumer-dispatch invocations enqueue concurrently under
//! a cheap lock; dequeuing is reserved for whoever holds the flush gate,
//! so no two flushes ever drain overlapping entries.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use emis_events::events::SendMessageRequested;
use emis_events::EventEnvelope;

type BufferedEvent = EventEnvelope<SendMessageRequested>;

/// FIFO buffer of pending message writes, shared between the consumer
/// dispatch path (enqueue) and the flush routine (drain).
pub struct MessageBuffer {
    queue: Mutex<VecDeque<BufferedEvent>>,
    flush_gate: tokio::sync::Mutex<()>,
    last_flush: Mutex<Instant>,
}

impl MessageBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            flush_gate: tokio::sync::Mutex::new(()),
            last_flush: Mutex::new(Instant::now()),
        }
    }

    /// Append an event. Safe to call from concurrent handler invocations.
    pub fn enqueue(&self, event: BufferedEvent) {
        self.queue.lock().expect("buffer lock poisoned").push_back(event);
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().expect("buffer lock poisoned").len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Try to become the flush owner.
    ///
    /// Returns `None` when another flush is in-flight: the caller treats
    /// that as a no-op, not an error, and leaves the buffered items for
    /// the running flush (or the next attempt).
    pub fn try_flush_gate(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        self.flush_gate.try_lock().ok()
    }

    /// Dequeue up to `max` entries in FIFO order.
    ///
    /// Only the flush-gate holder may call this.
    pub fn drain(&self, max: usize) -> Vec<BufferedEvent> {
        let mut queue = self.queue.lock().expect("buffer lock poisoned");
        let count = queue.len().min(max);
        queue.drain(..count).collect()
    }

    /// Put entries back at the front of the buffer, preserving their
    /// order ahead of anything enqueued meanwhile. Used when a flush
    /// fails after dequeuing: dequeued-but-unflushed entries must not be
    /// dropped.
    pub fn requeue_front(&self, entries: Vec<BufferedEvent>) {
        let mut queue = self.queue.lock().expect("buffer lock poisoned");
        for entry in entries.into_iter().rev() {
            queue.push_front(entry);
        }
    }

    /// Time since the last successful flush.
    #[must_use]
    pub fn last_flush_elapsed(&self) -> Duration {
        self.last_flush.lock().expect("buffer lock poisoned").elapsed()
    }

    /// Record a successful flush.
    pub fn mark_flushed(&self) {
        *self.last_flush.lock().expect("buffer lock poisoned") = Instant::now();
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
