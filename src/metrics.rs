//! Search and listing counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            value: AtomicU64::new(0),
        }
    }

    /// Get the counter name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Reset the counter to zero.
    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Counters for one federation instance.
#[derive(Debug)]
pub struct Metrics {
    /// `find` calls that passed key validation.
    pub searches: Counter,
    /// Searches that located a VM.
    pub vms_found: Counter,
    /// Searches that drained the federation without a match.
    pub not_found: Counter,
    /// Tenants skipped because no session could be established.
    pub connect_failures: Counter,
    /// Remote lookups that failed for a reason other than absence.
    pub lookup_failures: Counter,
    /// Individual (tenant, datacenter) lookups performed.
    pub datacenters_searched: Counter,
    /// `list_all` calls completed.
    pub listings: Counter,
}

impl Metrics {
    /// Create a zeroed metrics set.
    pub fn new() -> Self {
        Self {
            searches: Counter::new("muster_searches_total"),
            vms_found: Counter::new("muster_vms_found_total"),
            not_found: Counter::new("muster_not_found_total"),
            connect_failures: Counter::new("muster_connect_failures_total"),
            lookup_failures: Counter::new("muster_lookup_failures_total"),
            datacenters_searched: Counter::new("muster_datacenters_searched_total"),
            listings: Counter::new("muster_listings_total"),
        }
    }

    /// Snapshot every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            searches: self.searches.get(),
            vms_found: self.vms_found.get(),
            not_found: self.not_found.get(),
            connect_failures: self.connect_failures.get(),
            lookup_failures: self.lookup_failures.get(),
            datacenters_searched: self.datacenters_searched.get(),
            listings: self.listings.get(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub searches: u64,
    pub vms_found: u64,
    pub not_found: u64,
    pub connect_failures: u64,
    pub lookup_failures: u64,
    pub datacenters_searched: u64,
    pub listings: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_basics() {
        let counter = Counter::new("test_total");
        assert_eq!(counter.get(), 0);
        counter.inc();
        counter.inc();
        assert_eq!(counter.get(), 2);
        counter.reset();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.name(), "test_total");
    }

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.searches.inc();
        metrics.vms_found.inc();
        metrics.datacenters_searched.inc();
        metrics.datacenters_searched.inc();

        let snap = metrics.snapshot();
        assert_eq!(snap.searches, 1);
        assert_eq!(snap.vms_found, 1);
        assert_eq!(snap.datacenters_searched, 2);
        assert_eq!(snap.not_found, 0);
    }
}
