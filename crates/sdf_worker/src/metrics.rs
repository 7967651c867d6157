//! Run counters shared by the producer and worker threads.
//!
//! Lock-free atomics; one instance per pipeline run, shared through `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    records_read: AtomicU64,
    records_processed: AtomicU64,
    results_sent: AtomicU64,
    tests_failed: AtomicU64,
    worker_failures: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_read: u64,
    pub records_processed: u64,
    pub results_sent: u64,
    pub tests_failed: u64,
    pub worker_failures: u64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            records_read: AtomicU64::new(0),
            records_processed: AtomicU64::new(0),
            results_sent: AtomicU64::new(0),
            tests_failed: AtomicU64::new(0),
            worker_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_records_read(&self) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_records_processed(&self) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_results_sent(&self) {
        self.results_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_tests_failed(&self) {
        self.tests_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_worker_failures(&self) {
        self.worker_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_read: self.records_read.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            results_sent: self.results_sent.load(Ordering::Relaxed),
            tests_failed: self.tests_failed.load(Ordering::Relaxed),
            worker_failures: self.worker_failures.load(Ordering::Relaxed),
        }
    }
}
