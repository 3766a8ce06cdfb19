//! Bounded recent-history set for the discovery loop.
//!
//! Remembers which request ids were already claimed or found settled so a tick does
//! not re-read them. It is only a throughput hint: forgetting an id costs one extra
//! lock attempt and status read, never a double execution.

use std::collections::{HashSet, VecDeque};

use crate::store::RequestId;

/// FIFO set with a fixed capacity; the oldest id is evicted first.
#[derive(Debug)]
pub struct RecentlySeen {
    capacity: usize,
    order: VecDeque<RequestId>,
    members: HashSet<RequestId>,
}

impl RecentlySeen {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.members.contains(id)
    }

    /// Remember `id`. Returns `false` if it was already present.
    pub fn insert(&mut self, id: RequestId) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.members.insert(id.clone());
        self.order.push_back(id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> RequestId {
        RequestId::parse(&format!("r{n}")).unwrap()
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut seen = RecentlySeen::new(3);
        for n in 0..3 {
            assert!(seen.insert(id(n)));
        }
        assert!(!seen.insert(id(1)));

        seen.insert(id(3));
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&id(0)));
        assert!(seen.contains(&id(1)));
        assert!(seen.contains(&id(3)));
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut seen = RecentlySeen::new(10);
        for n in 0..1000 {
            seen.insert(id(n));
        }
        assert_eq!(seen.len(), 10);
        assert!(seen.contains(&id(999)));
        assert!(!seen.contains(&id(989)));
    }
}
