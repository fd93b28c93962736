//! Serialised outbound write queue for one connection attempt.
//!
//! The websocket allows one write in flight at a time.  Producers (the event
//! bridge on middleware tasks, the handshake callback) call
//! [`OutboundQueue::enqueue`] from any thread; the queue keeps at most one
//! message on the wire and holds the rest in FIFO order until the writer
//! reports completion through [`OutboundQueue::complete_write`].
//!
//! ```text
//! enqueue ──► [pending FIFO] ──► wire channel ──► write loop ──► sink.send
//!                 ▲                                                 │
//!                 └────────────── complete_write(ok) ◄──────────────┘
//! ```
//!
//! Every state transition happens under one mutex, including the hand-off to
//! the wire channel, so wire order always equals enqueue order.
//!
//! After a failed write, or once the attempt ends, the queue is closed:
//! pending messages are discarded and later enqueues are dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::application::MessageSink;

/// One message handed to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Position in enqueue order, starting at zero.
    pub seq: u64,
    /// Text frame payload.
    pub payload: String,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<OutboundMessage>,
    in_flight: bool,
    next_seq: u64,
    closed: bool,
}

/// FIFO of outbound text with a single write in flight.
#[derive(Debug)]
pub struct OutboundQueue {
    state: Mutex<QueueState>,
    wire: mpsc::UnboundedSender<OutboundMessage>,
    verbose: bool,
}

impl OutboundQueue {
    /// Creates a queue and the receiver the write loop drains.
    pub fn new(verbose: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (wire, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            wire,
            verbose,
        });
        (queue, rx)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `payload` to the queue.
    ///
    /// Starts a write immediately when none is in flight.  Returns the
    /// message's sequence number, or `None` if the queue is closed.
    pub fn enqueue(&self, payload: String) -> Option<u64> {
        let mut state = self.lock();
        if state.closed {
            debug!("outbound queue closed; dropping message");
            return None;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let message = OutboundMessage { seq, payload };

        if state.in_flight {
            state.pending.push_back(message);
            if self.verbose {
                debug!("outbound queue size: {}", state.pending.len());
            }
        } else {
            self.start_write(&mut state, message);
        }
        Some(seq)
    }

    /// Reports the outcome of the write in flight.
    ///
    /// On success the next pending message, if any, is started.  On failure
    /// the queue closes and discards everything pending.
    pub fn complete_write(&self, ok: bool) {
        let mut state = self.lock();
        state.in_flight = false;
        if !ok {
            Self::close_locked(&mut state);
            return;
        }
        if let Some(next) = state.pending.pop_front() {
            self.start_write(&mut state, next);
        }
    }

    /// Closes the queue.  Pending messages are discarded.
    pub fn close(&self) {
        Self::close_locked(&mut self.lock());
    }

    fn close_locked(state: &mut QueueState) {
        if !state.closed && !state.pending.is_empty() {
            debug!("discarding {} queued outbound messages", state.pending.len());
        }
        state.closed = true;
        state.pending.clear();
    }

    fn start_write(&self, state: &mut QueueState, message: OutboundMessage) {
        if self.wire.send(message).is_err() {
            // Writer is gone; nothing more can reach the wire.
            Self::close_locked(state);
            return;
        }
        state.in_flight = true;
    }

    /// Messages waiting behind the one in flight.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Returns `true` while a write has been started and not completed.
    pub fn is_write_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// Returns `true` once the queue stopped accepting messages.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl MessageSink for OutboundQueue {
    fn send_text(&self, text: String) {
        self.enqueue(text);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_message_goes_straight_to_the_wire() {
        // Arrange
        let (queue, mut wire) = OutboundQueue::new(false);

        // Act
        let seq = queue.enqueue("a".to_string());

        // Assert
        assert_eq!(seq, Some(0));
        assert!(queue.is_write_in_flight());
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(wire.try_recv().unwrap().payload, "a");
    }

    #[test]
    fn test_only_one_write_in_flight() {
        // Arrange
        let (queue, mut wire) = OutboundQueue::new(true);

        // Act
        queue.enqueue("a".to_string());
        queue.enqueue("b".to_string());
        queue.enqueue("c".to_string());

        // Assert: only "a" reached the wire
        assert_eq!(wire.try_recv().unwrap().payload, "a");
        assert!(wire.try_recv().is_err());
        assert_eq!(queue.pending_len(), 2);
    }

    #[test]
    fn test_completion_releases_messages_in_fifo_order() {
        // Arrange
        let (queue, mut wire) = OutboundQueue::new(false);
        for text in ["a", "b", "c"] {
            queue.enqueue(text.to_string());
        }

        // Act / Assert
        let mut seen = Vec::new();
        while let Ok(message) = wire.try_recv() {
            seen.push(message.payload);
            queue.complete_write(true);
        }
        assert_eq!(seen, ["a", "b", "c"]);
        assert!(!queue.is_write_in_flight());
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_failed_write_closes_queue_and_drops_pending() {
        // Arrange
        let (queue, mut wire) = OutboundQueue::new(false);
        queue.enqueue("a".to_string());
        queue.enqueue("b".to_string());
        wire.try_recv().unwrap();

        // Act
        queue.complete_write(false);

        // Assert
        assert!(queue.is_closed());
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.enqueue("c".to_string()), None);
        assert!(wire.try_recv().is_err());
    }

    #[test]
    fn test_enqueue_after_close_is_dropped() {
        let (queue, mut wire) = OutboundQueue::new(false);
        queue.close();
        assert_eq!(queue.enqueue("late".to_string()), None);
        assert!(wire.try_recv().is_err());
    }

    #[test]
    fn test_dropped_writer_closes_queue() {
        let (queue, wire) = OutboundQueue::new(false);
        drop(wire);
        queue.enqueue("a".to_string());
        assert!(queue.is_closed());
        assert!(!queue.is_write_in_flight());
    }

    #[test]
    fn test_concurrent_producers_each_keep_their_order() {
        // Arrange
        let (queue, mut wire) = OutboundQueue::new(false);

        // Act: two producers enqueue 100 messages each
        let handles: Vec<_> = ["x", "y"]
            .into_iter()
            .map(|tag| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..100 {
                        queue.enqueue(format!("{tag}{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = Vec::new();
        while let Ok(message) = wire.try_recv() {
            seen.push(message);
            queue.complete_write(true);
        }

        // Assert: nothing lost, seq is strictly increasing, per-producer order kept
        assert_eq!(seen.len(), 200);
        assert!(seen.windows(2).all(|w| w[0].seq < w[1].seq));
        for tag in ["x", "y"] {
            let own: Vec<_> = seen
                .iter()
                .filter(|m| m.payload.starts_with(tag))
                .map(|m| m.payload.clone())
                .collect();
            let expected: Vec<_> = (0..100).map(|i| format!("{tag}{i}")).collect();
            assert_eq!(own, expected);
        }
    }
}
