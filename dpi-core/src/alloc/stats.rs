//! ## dpi-core::alloc::stats
//! **Lend/return counters for a slot pool**
//!
//! Every counter is a relaxed atomic. They are telemetry, not synchronization:
//! the free-list alone decides slot ownership.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Per-pool lend/return statistics.
#[derive(Debug, Default)]
pub struct PoolStats {
    acquired: AtomicU64,
    exhausted: AtomicU64,
    released: AtomicU64,
    outstanding: AtomicUsize,
    peak_outstanding: AtomicUsize,
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStatsSnapshot {
    pub acquired: u64,
    pub exhausted: u64,
    pub released: u64,
    pub outstanding: usize,
    pub peak_outstanding: usize,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_acquire(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        let now = self.outstanding.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_outstanding.fetch_max(now, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_release(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
    }

    /// Successful `acquire` calls.
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// `acquire` calls that found the pool empty.
    pub fn exhausted(&self) -> u64 {
        self.exhausted.load(Ordering::Relaxed)
    }

    /// Slots returned to the pool.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Leases currently held.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Highest number of simultaneously held leases observed.
    pub fn peak_outstanding(&self) -> usize {
        self.peak_outstanding.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            acquired: self.acquired(),
            exhausted: self.exhausted(),
            released: self.released(),
            outstanding: self.outstanding(),
            peak_outstanding: self.peak_outstanding(),
        }
    }
}
