//! Bounded replay buffer for late-joining subscribers.
//!
//! Eviction is strict FIFO by insertion order, irrespective of event type or
//! timestamp. Relayed events can arrive slightly out of timestamp order;
//! readers that display chronologically re-sort on their side.

use std::collections::VecDeque;
use std::sync::Arc;

use herald_protocol::Event;

#[derive(Debug)]
pub struct HistoryBuffer {
    entries: VecDeque<Arc<Event>>,
    capacity: usize,
    default_limit: usize,
}

impl HistoryBuffer {
    /// `capacity` is raised to at least 1; `default_limit` is clamped to `1..=capacity`.
    pub fn new(capacity: usize, default_limit: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            default_limit: default_limit.clamp(1, capacity),
        }
    }

    /// Insert at the tail, evicting from the head until within capacity.
    pub fn append(&mut self, event: Arc<Event>) {
        self.entries.push_back(event);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Up to `limit` most recent events, oldest first.
    ///
    /// `None` or `Some(0)` uses the default limit; larger limits are clamped
    /// to the capacity.
    pub fn snapshot(&self, limit: Option<usize>) -> Vec<Arc<Event>> {
        let take = self.resolve_limit(limit).min(self.entries.len());
        let skip = self.entries.len() - take;
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn resolve_limit(&self, limit: Option<usize>) -> usize {
        match limit {
            None | Some(0) => self.default_limit,
            Some(n) => n.min(self.capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }
}
