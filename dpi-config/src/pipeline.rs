//! Capture and inspection stage parameters.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Worker and queue configuration for the capture → inspect pipeline.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct PipelineConfig {
    /// Producer threads writing frames into leased slots.
    #[validate(range(min = 1, max = 256))]
    #[serde(default = "default_workers")]
    pub capture_workers: usize,

    /// Consumer threads inspecting descriptors.
    #[validate(range(min = 1, max = 256))]
    #[serde(default = "default_workers")]
    pub inspect_workers: usize,

    /// Bounded queue between the two stages.
    #[validate(range(min = 1, max = 1048576))]
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Frames each capture worker produces before stopping.
    #[validate(range(min = 1))]
    #[serde(default = "default_packets_per_worker")]
    pub packets_per_worker: u64,

    /// Fraction of synthetic frames emitted with broken layer offsets.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub malformed_rate: f64,

    /// Seed for the synthetic traffic generator.
    #[serde(default)]
    pub seed: u64,
}

fn default_workers() -> usize {
    (num_cpus::get() / 2).max(1)
}

fn default_queue_depth() -> usize {
    1024
}

fn default_packets_per_worker() -> u64 {
    100_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_workers: default_workers(),
            inspect_workers: default_workers(),
            queue_depth: default_queue_depth(),
            packets_per_worker: default_packets_per_worker(),
            malformed_rate: 0.0,
            seed: 0,
        }
    }
}
