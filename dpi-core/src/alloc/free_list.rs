//! ## dpi-core::alloc::free_list
//! **Stacks of free slot indices**
//!
//! Two interchangeable strategies back the pool. Both treat "move the cursor"
//! and "read/write the entry at the cursor" as one linearizable step:
//!
//! - [`TaggedStack`]: lock-free Treiber stack. The head word packs a 32-bit
//!   version tag next to the 32-bit top index, and every successful push or pop
//!   bumps the tag, so a stale compare-and-swap can never succeed after the
//!   same index was popped and pushed back (ABA).
//! - [`LockedStack`]: the cursor and the index array behind one `parking_lot`
//!   mutex.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Terminator for the intrusive `next` links; never a valid slot index.
pub(crate) const NIL: u32 = u32::MAX;

/// Selects the synchronization strategy of a pool's free-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeListKind {
    /// Versioned compare-and-swap stack.
    #[default]
    LockFree,
    /// Mutex-guarded stack.
    Locked,
}

impl std::fmt::Display for FreeListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FreeListKind::LockFree => f.write_str("lock_free"),
            FreeListKind::Locked => f.write_str("locked"),
        }
    }
}

#[inline]
fn pack(tag: u32, top: u32) -> u64 {
    (u64::from(tag) << 32) | u64::from(top)
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

/// Lock-free stack of slot indices with a version-tagged head.
pub(crate) struct TaggedStack {
    head: AtomicU64,
    next: Box<[AtomicU32]>,
    len: AtomicUsize,
}

impl TaggedStack {
    /// Builds a full stack whose pop order is `0, 1, .., capacity - 1`.
    pub(crate) fn full(capacity: u32) -> Self {
        let next = (0..capacity)
            .map(|i| AtomicU32::new(if i + 1 < capacity { i + 1 } else { NIL }))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let top = if capacity == 0 { NIL } else { 0 };

        Self {
            head: AtomicU64::new(pack(0, top)),
            next,
            len: AtomicUsize::new(capacity as usize),
        }
    }

    #[inline]
    pub(crate) fn pop(&self) -> Option<u32> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            let (tag, top) = unpack(head);
            if top == NIL {
                return None;
            }
            // May be stale if `top` was taken concurrently; the tag makes the
            // exchange below fail in that case.
            let next = self.next[top as usize].load(Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.len.fetch_sub(1, Ordering::Relaxed);
                    return Some(top);
                }
                Err(actual) => head = actual,
            }
        }
    }

    #[inline]
    pub(crate) fn push(&self, index: u32) {
        // Counted before it becomes poppable so `len` never underflows.
        self.len.fetch_add(1, Ordering::Relaxed);
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            let (tag, top) = unpack(head);
            self.next[index as usize].store(top, Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), index),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }
}

/// Mutex-guarded stack of slot indices.
pub(crate) struct LockedStack {
    indices: Mutex<Vec<u32>>,
}

impl LockedStack {
    /// Builds a full stack whose pop order is `0, 1, .., capacity - 1`.
    pub(crate) fn full(capacity: u32) -> Self {
        let mut indices = Vec::with_capacity(capacity as usize);
        indices.extend((0..capacity).rev());
        Self {
            indices: Mutex::new(indices),
        }
    }

    #[inline]
    pub(crate) fn pop(&self) -> Option<u32> {
        self.indices.lock().pop()
    }

    #[inline]
    pub(crate) fn push(&self, index: u32) {
        // Capacity was reserved for every index up front; this never reallocates.
        self.indices.lock().push(index);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.indices.lock().len()
    }
}

pub(crate) enum FreeList {
    LockFree(TaggedStack),
    Locked(LockedStack),
}

impl FreeList {
    pub(crate) fn full(kind: FreeListKind, capacity: u32) -> Self {
        match kind {
            FreeListKind::LockFree => FreeList::LockFree(TaggedStack::full(capacity)),
            FreeListKind::Locked => FreeList::Locked(LockedStack::full(capacity)),
        }
    }

    #[inline]
    pub(crate) fn pop(&self) -> Option<u32> {
        match self {
            FreeList::LockFree(stack) => stack.pop(),
            FreeList::Locked(stack) => stack.pop(),
        }
    }

    #[inline]
    pub(crate) fn push(&self, index: u32) {
        match self {
            FreeList::LockFree(stack) => stack.push(index),
            FreeList::Locked(stack) => stack.push(index),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        match self {
            FreeList::LockFree(stack) => stack.len(),
            FreeList::Locked(stack) => stack.len(),
        }
    }

    pub(crate) fn kind(&self) -> FreeListKind {
        match self {
            FreeList::LockFree(_) => FreeListKind::LockFree,
            FreeList::Locked(_) => FreeListKind::Locked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    const KINDS: [FreeListKind; 2] = [FreeListKind::LockFree, FreeListKind::Locked];

    #[test]
    fn pops_in_ascending_order() {
        for kind in KINDS {
            let list = FreeList::full(kind, 4);
            let popped: Vec<_> = std::iter::from_fn(|| list.pop()).collect();
            assert_eq!(popped, vec![0, 1, 2, 3], "{kind}");
            assert_eq!(list.len(), 0);
        }
    }

    #[test]
    fn push_is_lifo() {
        for kind in KINDS {
            let list = FreeList::full(kind, 3);
            let a = list.pop().unwrap();
            let b = list.pop().unwrap();
            list.push(a);
            list.push(b);
            assert_eq!(list.pop(), Some(b));
            assert_eq!(list.pop(), Some(a));
            assert_eq!(list.len(), 1);
        }
    }

    #[test]
    fn empty_list_pops_none() {
        for kind in KINDS {
            let list = FreeList::full(kind, 0);
            assert_eq!(list.pop(), None);
            assert_eq!(list.len(), 0);
        }
    }

    #[test]
    fn tag_advances_on_every_transition() {
        let stack = TaggedStack::full(2);
        let (tag0, _) = unpack(stack.head.load(Ordering::Relaxed));
        let index = stack.pop().unwrap();
        stack.push(index);
        let (tag2, top) = unpack(stack.head.load(Ordering::Relaxed));
        assert_eq!(top, index);
        assert_eq!(tag2, tag0.wrapping_add(2));
    }

    #[test]
    fn concurrent_churn_preserves_every_index() {
        for kind in KINDS {
            let list = Arc::new(FreeList::full(kind, 64));
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let list = Arc::clone(&list);
                    std::thread::spawn(move || {
                        for _ in 0..10_000 {
                            if let Some(index) = list.pop() {
                                list.push(index);
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let drained: Vec<_> = std::iter::from_fn(|| list.pop()).collect();
            assert_eq!(drained.len(), 64, "{kind}");
            let unique: HashSet<_> = drained.into_iter().collect();
            assert_eq!(unique, (0..64).collect::<HashSet<_>>(), "{kind}");
        }
    }
}
