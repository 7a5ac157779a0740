use std::collections::{HashSet, VecDeque};
use std::time::Duration;

/// Fixed-capacity set of recent presentation timestamps.
///
/// Used to detect frames the capture layer delivers more than once.
/// Overflow behavior: evicts the oldest insertion.
#[derive(Debug, Clone, Default)]
pub struct TimestampHistory {
    order: VecDeque<Duration>,
    members: HashSet<Duration>,
    capacity: usize,
}

impl TimestampHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity.min(1024)),
            members: HashSet::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Insert `pts`, returning `false` if it is already in the history.
    ///
    /// A capacity of zero disables duplicate detection.
    pub fn insert(&mut self, pts: Duration) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.members.contains(&pts) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.order.push_back(pts);
        self.members.insert(pts);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
