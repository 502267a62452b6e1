//! Randomized acquire/release churn against a standalone pool.
//!
//! Each thread holds a private set of leases, stamps every slot it acquires
//! with its own byte and checks the stamp before giving the slot back. A stamp
//! that changed, or a lease count above capacity, is a violation. Once every
//! thread has returned its leases, any slot missing from the free-list is one
//! too.

use std::sync::atomic::{AtomicIsize, AtomicU64, Ordering};
use std::time::Instant;

use dpi_core::alloc::FreeListKind;
use dpi_core::{SlotLease, SlotPool};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressPlan {
    pub threads: usize,
    pub iterations: usize,
    pub slots: usize,
    pub strategy: FreeListKind,
    pub seed: u64,
}

impl Default for StressPlan {
    fn default() -> Self {
        Self {
            threads: 8,
            iterations: 100_000,
            slots: 64,
            strategy: FreeListKind::default(),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StressReport {
    pub strategy: FreeListKind,
    pub acquired: u64,
    pub exhausted: u64,
    pub released: u64,
    pub peak_outstanding: usize,
    pub violations: u64,
    /// Slots not back on the free-list after every lease was returned.
    pub missing_slots: usize,
    pub elapsed_ms: u64,
}

impl StressReport {
    pub fn is_clean(&self) -> bool {
        self.violations == 0 && self.missing_slots == 0 && self.acquired == self.released
    }
}

fn missing_slots(pool: &SlotPool) -> usize {
    pool.capacity().saturating_sub(pool.available())
}

#[instrument(
    name = "stress",
    skip_all,
    fields(threads = plan.threads, slots = plan.slots, strategy = %plan.strategy)
)]
pub fn run_stress(plan: &StressPlan) -> Result<StressReport, EngineError> {
    let pool = SlotPool::with_strategy(plan.slots, plan.strategy)?;
    let outstanding = AtomicIsize::new(0);
    let violations = AtomicU64::new(0);
    let started = Instant::now();

    crossbeam::thread::scope(|s| -> Result<(), EngineError> {
        for thread_id in 0..plan.threads {
            let (pool, outstanding, violations) = (&pool, &outstanding, &violations);
            s.builder()
                .name(format!("stress-{thread_id}"))
                .spawn(move |_| {
                    churn(pool, plan, thread_id, outstanding, violations);
                })?;
        }
        Ok(())
    })
    .map_err(|_| EngineError::WorkerPanicked)??;

    let missing = missing_slots(&pool);
    if missing > 0 {
        error!(
            missing,
            available = pool.available(),
            capacity = pool.capacity(),
            "Slots missing from the free-list after stress run"
        );
    }

    let stats = pool.stats().snapshot();
    let report = StressReport {
        strategy: plan.strategy,
        acquired: stats.acquired,
        exhausted: stats.exhausted,
        released: stats.released,
        peak_outstanding: stats.peak_outstanding,
        violations: violations.load(Ordering::Relaxed),
        missing_slots: missing,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        acquired = report.acquired,
        exhausted = report.exhausted,
        violations = report.violations,
        elapsed_ms = report.elapsed_ms,
        "Stress run finished"
    );
    Ok(report)
}

fn churn(
    pool: &SlotPool,
    plan: &StressPlan,
    thread_id: usize,
    outstanding: &AtomicIsize,
    violations: &AtomicU64,
) {
    let mut rng = SmallRng::seed_from_u64(plan.seed.wrapping_add(thread_id as u64));
    let mut held: Vec<(SlotLease<'_>, u8)> = Vec::new();
    let capacity = plan.slots as isize;

    for i in 0..plan.iterations {
        if rng.random_bool(0.5) {
            let Ok(mut lease) = pool.acquire() else {
                continue;
            };
            let now = outstanding.fetch_add(1, Ordering::SeqCst) + 1;
            if now > capacity {
                violations.fetch_add(1, Ordering::Relaxed);
                error!(outstanding = now, capacity, "More leases than slots");
            }
            let stamp = (thread_id.wrapping_mul(31).wrapping_add(i)) as u8;
            lease.as_mut_slice().fill(stamp);
            held.push((lease, stamp));
        } else if !held.is_empty() {
            let at = rng.random_range(0..held.len());
            let (lease, stamp) = held.swap_remove(at);
            if let Some(pos) = lease.as_slice().iter().position(|&b| b != stamp) {
                violations.fetch_add(1, Ordering::Relaxed);
                error!(slot = %lease.index(), offset = pos, "Slot written through another lease");
            }
            outstanding.fetch_sub(1, Ordering::SeqCst);
            lease.release();
        }
    }
    outstanding.fetch_sub(held.len() as isize, Ordering::SeqCst);
}
