//! Observability configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Logging and metrics parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// Fallback `tracing` level when `RUST_LOG` is unset.
    #[validate(custom(function = validation::validate_log_level))]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Export Prometheus metrics at the end of a run.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics: default_true(),
        }
    }
}
