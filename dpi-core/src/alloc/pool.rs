//! ## dpi-core::alloc::pool
//! **Fixed-size slot pool for packet buffers**
//!
//! One contiguous arena of `slot_count * SLOT_SIZE` bytes is allocated when the
//! pool is built and never resized. Slot `i` always covers bytes
//! `[i * SLOT_SIZE, (i + 1) * SLOT_SIZE)` of the arena, so two distinct indices
//! can never alias. Which index is free is tracked by a [`FreeList`]; the bytes
//! of a leased index are reachable only through the [`SlotLease`] that owns it.

use std::cell::UnsafeCell;
#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

use super::free_list::{FreeList, FreeListKind, NIL};
use super::stats::PoolStats;

/// Bytes per slot; the largest frame the pipeline accepts.
pub const SLOT_SIZE: usize = 2048;

/// Errors raised while building a pool.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("Slot count must be greater than zero")]
    ZeroCapacity,

    #[error("Slot count {0} exceeds the 32-bit slot index space")]
    CapacityTooLarge(usize),
}

/// Every slot is leased. Callers treat this as backpressure, not as a fault.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Slot pool exhausted")]
pub struct Exhausted;

/// Position of a slot in its pool's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u32);

impl SlotIndex {
    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// 2048 is a multiple of 64, so alignment adds no padding and the arena stays
// one contiguous run of slots.
#[repr(C, align(64))]
struct Slot(UnsafeCell<[u8; SLOT_SIZE]>);

/// Fixed-capacity pool lending `SLOT_SIZE`-byte buffers to concurrent callers.
///
/// Build one per independent arena and share it by reference (or `Arc`) with
/// every producer and consumer.
pub struct SlotPool {
    arena: Box<[Slot]>,
    free: FreeList,
    stats: PoolStats,
    #[cfg(debug_assertions)]
    leased: Box<[AtomicBool]>,
}

// SAFETY: slot bytes are only reachable through a `SlotLease`, and the
// free-list hands each index to at most one lease at a time.
unsafe impl Sync for SlotPool {}

impl SlotPool {
    /// Creates a pool with `slot_count` slots and the default lock-free free-list.
    pub fn new(slot_count: usize) -> Result<Self, PoolError> {
        Self::with_strategy(slot_count, FreeListKind::default())
    }

    /// Creates a pool with `slot_count` slots and an explicit free-list strategy.
    pub fn with_strategy(slot_count: usize, kind: FreeListKind) -> Result<Self, PoolError> {
        if slot_count == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let capacity = u32::try_from(slot_count)
            .ok()
            .filter(|&count| count != NIL)
            .ok_or(PoolError::CapacityTooLarge(slot_count))?;

        let arena = (0..slot_count)
            .map(|_| Slot(UnsafeCell::new([0u8; SLOT_SIZE])))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(
            slot_count,
            strategy = %kind,
            bytes = slot_count * SLOT_SIZE,
            "Slot pool allocated"
        );

        Ok(Self {
            arena,
            free: FreeList::full(kind, capacity),
            stats: PoolStats::new(),
            #[cfg(debug_assertions)]
            leased: (0..slot_count).map(|_| AtomicBool::new(false)).collect(),
        })
    }

    /// Leases one free slot.
    ///
    /// Returns [`Exhausted`] immediately when no slot is free. Never blocks and
    /// never allocates.
    #[inline]
    pub fn acquire(&self) -> Result<SlotLease<'_>, Exhausted> {
        match self.free.pop() {
            Some(raw) => {
                self.mark_leased(raw);
                self.stats.record_acquire();
                Ok(SlotLease {
                    pool: self,
                    index: SlotIndex(raw),
                })
            }
            None => {
                self.stats.record_exhausted();
                Err(Exhausted)
            }
        }
    }

    /// Returns a detached slot index to the free-list.
    ///
    /// Dropping a [`SlotLease`] already does this; use this only for indices
    /// obtained from [`SlotLease::into_index`].
    ///
    /// # Safety
    ///
    /// `index` must come from `into_index` on a lease of *this* pool and must not
    /// have been released or re-attached since. Releasing twice lets two leases
    /// alias the same bytes. Debug builds panic on a detected double release.
    #[inline]
    pub unsafe fn release(&self, index: SlotIndex) {
        self.reclaim(index);
    }

    #[inline]
    fn reclaim(&self, index: SlotIndex) {
        debug_assert!(index.get() < self.capacity(), "slot {index} out of range");
        self.mark_released(index.0);
        // Counted before the index becomes reusable so `outstanding` never
        // exceeds capacity.
        self.stats.record_release();
        self.free.push(index.0);
    }

    #[inline]
    #[allow(unused_variables)]
    fn mark_leased(&self, raw: u32) {
        #[cfg(debug_assertions)]
        {
            let was_leased = self.leased[raw as usize].swap(true, Ordering::AcqRel);
            debug_assert!(!was_leased, "slot #{raw} handed out while still leased");
        }
    }

    #[inline]
    #[allow(unused_variables)]
    fn mark_released(&self, raw: u32) {
        #[cfg(debug_assertions)]
        {
            let was_leased = self.leased[raw as usize].swap(false, Ordering::AcqRel);
            debug_assert!(was_leased, "slot #{raw} released while not leased");
        }
    }

    #[inline]
    fn slot_ptr(&self, index: SlotIndex) -> *mut [u8; SLOT_SIZE] {
        self.arena[index.get()].0.get()
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// Slots currently on the free-list. A snapshot under concurrency.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Slots currently leased. A snapshot under concurrency.
    pub fn leased(&self) -> usize {
        self.stats.outstanding()
    }

    pub fn slot_size(&self) -> usize {
        SLOT_SIZE
    }

    pub fn strategy(&self) -> FreeListKind {
        self.free.kind()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl std::fmt::Debug for SlotPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("strategy", &self.strategy())
            .finish()
    }
}

/// Exclusive handle to one leased slot.
///
/// The lease borrows the pool, so it cannot outlive it, and it is the only way to
/// reach the slot's bytes. Dropping the lease returns the slot.
pub struct SlotLease<'pool> {
    pool: &'pool SlotPool,
    index: SlotIndex,
}

impl<'pool> SlotLease<'pool> {
    #[inline]
    pub fn index(&self) -> SlotIndex {
        self.index
    }

    #[inline]
    pub fn pool(&self) -> &'pool SlotPool {
        self.pool
    }

    /// The whole slot, `SLOT_SIZE` bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: this lease is the only holder of `index` until it is dropped.
        unsafe { &*self.pool.slot_ptr(self.index) }
    }

    /// The whole slot, mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` rules out other borrows of this lease.
        unsafe { &mut *self.pool.slot_ptr(self.index) }
    }

    /// Returns the slot to the pool. Same as dropping the lease.
    #[inline]
    pub fn release(self) {
        drop(self);
    }

    /// Detaches the index from the lease without returning the slot.
    ///
    /// The slot stays leased until [`SlotPool::release`] or
    /// [`SlotLease::from_index`] takes it back.
    #[inline]
    pub fn into_index(self) -> SlotIndex {
        let index = self.index;
        std::mem::forget(self);
        index
    }

    /// Re-attaches a detached index to a lease.
    ///
    /// # Safety
    ///
    /// `index` must come from `into_index` on a lease of `pool` and must not have
    /// been released or re-attached since.
    #[inline]
    pub unsafe fn from_index(pool: &'pool SlotPool, index: SlotIndex) -> Self {
        Self { pool, index }
    }
}

impl Drop for SlotLease<'_> {
    #[inline]
    fn drop(&mut self) {
        self.pool.reclaim(self.index);
    }
}

impl std::fmt::Debug for SlotLease<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotLease")
            .field("index", &self.index)
            .finish()
    }
}
