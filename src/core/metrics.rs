use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of pool counters at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub checkouts: u64,
    pub exhausted: u64,
    pub returns: u64,
    pub discarded: u64,
    pub links_created: u64,
}

impl MetricsSnapshot {
    /// Fraction of checkout attempts that were turned away
    pub fn exhaustion_rate(&self) -> f64 {
        let attempts = self.checkouts + self.exhausted;
        if attempts == 0 {
            0.0
        } else {
            self.exhausted as f64 / attempts as f64
        }
    }
}

/// Thread-safe pool counters
#[derive(Debug, Default)]
pub struct PoolMetrics {
    checkouts: AtomicU64,
    exhausted: AtomicU64,
    returns: AtomicU64,
    discarded: AtomicU64,
    links_created: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_checkout(&self) {
        self.checkouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    /// A link came back after the pool was shut down
    pub fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_link_created(&self) {
        self.links_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            checkouts: self.checkouts.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            links_created: self.links_created.load(Ordering::Relaxed),
        }
    }
}
