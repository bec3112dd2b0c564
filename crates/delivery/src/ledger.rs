//! Bounded record of rules that have already fired.
//!
//! The ledger remembers at most `capacity` keys and forgets the oldest first.
//! A key forgotten this way can fire again, so the capacity must comfortably
//! exceed the number of (execution, phase, rule) triples that can be
//! re-reported while still live.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

#[derive(Debug)]
pub(crate) struct FiredLedger<K> {
    capacity: usize,
    keys: HashSet<K>,
    /// Insertion order, oldest first.
    order: VecDeque<K>,
}

impl<K: Clone + Eq + Hash> FiredLedger<K> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            keys: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    /// Returns `false` if the key was already present.
    pub(crate) fn insert(&mut self, key: K) -> bool {
        if !self.keys.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}
