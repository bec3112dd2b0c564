//! Delivery outcome counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time copy of the queue's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Events accepted onto the queue.
    pub enqueued: u64,
    /// Events rejected because the rule already fired for the execution and
    /// phase.
    pub duplicates: u64,
    /// Successful transport calls.
    pub delivered: u64,
    /// Failed attempts that were scheduled for another try.
    pub retried: u64,
    /// Deliveries recorded on the dead-letter path.
    pub dead_lettered: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    enqueued: AtomicU64,
    duplicates: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Counter {
    Enqueued,
    Duplicate,
    Delivered,
    Retried,
    DeadLettered,
}

impl StatsCounters {
    pub(crate) fn bump(&self, counter: Counter) {
        let cell = match counter {
            Counter::Enqueued => &self.enqueued,
            Counter::Duplicate => &self.duplicates,
            Counter::Delivered => &self.delivered,
            Counter::Retried => &self.retried,
            Counter::DeadLettered => &self.dead_lettered,
        };
        cell.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}
