//! Dispatcher metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one dispatcher
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Events passed to `process_event`
    received: AtomicU64,
    /// Events handed to a background worker
    async_dispatched: AtomicU64,
    /// Events evaluated inline because every background worker was busy
    sync_fallbacks: AtomicU64,
    /// Events that passed the filter
    accepted: AtomicU64,
    /// Events that failed the filter (including evaluation failures)
    rejected: AtomicU64,
    /// Source registry queries
    registry_lookups: AtomicU64,
    /// Registry queries that found nothing
    unknown_sources: AtomicU64,
}

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn async_dispatched(&self) -> u64 {
        self.async_dispatched.load(Ordering::Relaxed)
    }

    pub fn inc_async_dispatched(&self) {
        self.async_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sync_fallbacks(&self) -> u64 {
        self.sync_fallbacks.load(Ordering::Relaxed)
    }

    pub fn inc_sync_fallbacks(&self) {
        self.sync_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Record one verdict
    pub fn record_verdict(&self, accepted: bool) {
        if accepted {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn registry_lookups(&self) -> u64 {
        self.registry_lookups.load(Ordering::Relaxed)
    }

    pub fn inc_registry_lookups(&self) {
        self.registry_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_sources(&self) -> u64 {
        self.unknown_sources.load(Ordering::Relaxed)
    }

    pub fn inc_unknown_sources(&self) {
        self.unknown_sources.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    ///
    /// `eval_failures` lives in the workers, so the caller supplies it.
    pub fn snapshot(&self, eval_failures: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received(),
            async_dispatched: self.async_dispatched(),
            sync_fallbacks: self.sync_fallbacks(),
            accepted: self.accepted(),
            rejected: self.rejected(),
            eval_failures,
            registry_lookups: self.registry_lookups(),
            unknown_sources: self.unknown_sources(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub async_dispatched: u64,
    pub sync_fallbacks: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub eval_failures: u64,
    pub registry_lookups: u64,
    pub unknown_sources: u64,
}
