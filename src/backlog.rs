//! Bounded backlog of events that failed immediate delivery.
//!
//! DESIGN
//! ======
//! A FIFO with a hard cap. Pushing into a full backlog evicts the oldest
//! entry first, so memory stays bounded while the network is down and the
//! most recent behavior survives. Flushing drains from the front, which
//! keeps buffered events in their original relative order.

use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;

use crate::events::QueuedEvent;

#[derive(Debug, Clone)]
pub struct Backlog {
    events: VecDeque<QueuedEvent>,
    capacity: usize,
    evicted: u64,
}

impl Backlog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { events: VecDeque::with_capacity(capacity), capacity, evicted: 0 }
    }

    /// Append `event`, returning the entry evicted to make room, if any.
    pub fn push(&mut self, event: QueuedEvent) -> Option<QueuedEvent> {
        let evicted = if self.events.len() >= self.capacity {
            self.evicted += 1;
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Put back an entry taken with [`Backlog::pop`] after its send failed.
    ///
    /// If newer events filled the backlog in the meantime, the returned
    /// entry is the oldest and is dropped instead.
    pub fn requeue(&mut self, event: QueuedEvent) -> bool {
        if self.events.len() >= self.capacity {
            self.evicted += 1;
            return false;
        }
        self.events.push_front(event);
        true
    }

    pub fn pop(&mut self) -> Option<QueuedEvent> {
        self.events.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries dropped for capacity since creation.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedEvent> {
        self.events.iter()
    }
}

// =============================================================================
// RETRY DELAY
// =============================================================================

/// Linear backoff before retry number `attempt` (1-based), plus up to a
/// quarter step of random jitter.
#[must_use]
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let step = base.saturating_mul(attempt.max(1));
    let jitter_cap = u64::try_from(base.as_millis() / 4).unwrap_or(0);
    if jitter_cap == 0 {
        return step;
    }
    let jitter = rand::rng().random_range(0..=jitter_cap);
    step + Duration::from_millis(jitter)
}

#[cfg(test)]
#[path = "backlog_test.rs"]
mod tests;
