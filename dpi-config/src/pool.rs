//! Slot pool sizing.

use dpi_core::alloc::FreeListKind;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Packet buffer pool configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct PoolConfig {
    /// Number of 2048-byte slots allocated at startup.
    #[validate(range(min = 1, max = 16777216))]
    #[serde(default = "default_slot_count")]
    pub slot_count: usize,

    /// Free-list synchronization (`lock_free` or `locked`).
    #[serde(default)]
    pub free_list: FreeListKind,
}

fn default_slot_count() -> usize {
    4096
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            slot_count: default_slot_count(),
            free_list: FreeListKind::default(),
        }
    }
}
