//! Bounded FIFO of lines waiting for the Steam session to log on.

use std::collections::VecDeque;

use serde::Deserialize;

use super::RelayError;

/// What to do with a line that does not fit in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep what is queued, drop the new line.
    #[default]
    DropNewest,
    /// Evict the oldest queued line to make room.
    DropOldest,
}

/// Pending outbound lines for a not-yet-authenticated destination.
///
/// Single-use per session: after [`RelayQueue::drain_into`] the queue
/// refuses further lines until [`RelayQueue::reset`] starts a new session.
#[derive(Debug)]
pub struct RelayQueue {
    lines: VecDeque<String>,
    capacity: usize,
    drained: bool,
}

impl RelayQueue {
    /// Create an empty queue holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            drained: false,
        }
    }

    /// Append a line.
    ///
    /// # Errors
    ///
    /// [`RelayError::QueueOverflow`] when full, [`RelayError::QueueDrained`]
    /// when this session's queue was already flushed.
    pub fn enqueue(&mut self, line: String) -> Result<(), RelayError> {
        if self.drained {
            return Err(RelayError::QueueDrained);
        }
        if self.lines.len() >= self.capacity {
            return Err(RelayError::QueueOverflow {
                capacity: self.capacity,
            });
        }
        self.lines.push_back(line);
        Ok(())
    }

    /// Append a line, evicting the oldest one if the queue is full.
    ///
    /// Returns the evicted line, if any.
    ///
    /// # Errors
    ///
    /// [`RelayError::QueueDrained`] when this session's queue was already
    /// flushed, [`RelayError::QueueOverflow`] for a zero-capacity queue.
    pub fn enqueue_evicting(&mut self, line: String) -> Result<Option<String>, RelayError> {
        if self.drained {
            return Err(RelayError::QueueDrained);
        }
        if self.capacity == 0 {
            return Err(RelayError::QueueOverflow { capacity: 0 });
        }
        let evicted = if self.lines.len() >= self.capacity {
            self.lines.pop_front()
        } else {
            None
        };
        self.lines.push_back(line);
        Ok(evicted)
    }

    /// Emit every queued line to `sink` in enqueue order and empty the queue.
    ///
    /// Returns the number of lines emitted.
    ///
    /// # Errors
    ///
    /// [`RelayError::QueueDrained`] if called twice in one session.
    pub fn drain_into<F>(&mut self, mut sink: F) -> Result<usize, RelayError>
    where
        F: FnMut(String),
    {
        if self.drained {
            return Err(RelayError::QueueDrained);
        }
        self.drained = true;
        let count = self.lines.len();
        for line in self.lines.drain(..) {
            sink(line);
        }
        Ok(count)
    }

    /// Start a new session: accept enqueues and one drain again.
    ///
    /// Lines not yet delivered stay queued so a logon that fails before
    /// the flush does not lose them.
    pub fn reset(&mut self) {
        self.drained = false;
    }

    /// Number of lines waiting.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether this session's queue has been flushed.
    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Maximum number of lines held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
