//! # dpi-core
//!
//! Buffer management and packet descriptors for the DPI pipeline.
//!
//! ### Expectations (Production):
//! - Zero heap allocations per packet once the pool is constructed
//! - Non-blocking lend/return of fixed-size slots across threads
//! - No two live leases ever alias the same bytes
//!
//! ### Key Submodules:
//! - `alloc`: Fixed-slot pool with lock-free and mutex free-lists
//! - `packet`: Zero-copy descriptors over leased slots
//! - `flow`: Five-tuple flow keys and per-flow records
//! - `classify`: Open application-tag registry and SNI classifier contract
//! - `stats`: Atomic pipeline counters

pub mod alloc;
pub mod classify;
pub mod flow;
pub mod packet;
pub mod stats;

pub mod prelude {
    pub use crate::alloc::*;
    pub use crate::classify::*;
    pub use crate::flow::*;
    pub use crate::packet::*;
    pub use crate::stats::*;
}

pub use alloc::{Exhausted, PoolError, SlotIndex, SlotLease, SlotPool, SLOT_SIZE};
pub use packet::{DescriptorError, PacketJob};
