//! ## dpi-core::alloc
//! **Fixed-slot packet buffer pool**
//!
//! ### Expectations (Production):
//! - `acquire`/`release` never allocate and never block
//! - Exhaustion is reported immediately; the caller applies backpressure
//! - Distinct leases map to disjoint byte ranges by construction
//!
//! ### Key Submodules:
//! - `pool/`: The slot arena and the `SlotLease` handle
//! - `free_list/`: Tagged Treiber stack and mutex-guarded stack of free indices
//! - `stats/`: Lend/return counters

pub mod free_list;
pub mod pool;
pub mod stats;

pub use free_list::FreeListKind;
pub use pool::{Exhausted, PoolError, SlotIndex, SlotLease, SlotPool, SLOT_SIZE};
pub use stats::{PoolStats, PoolStatsSnapshot};
