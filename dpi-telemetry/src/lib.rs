//! # DPI Telemetry
//!
//! Crate for logging and metrics.

pub mod logging;
pub mod metrics;

pub use logging::{Logger, Throttle};
pub use metrics::MetricsRecorder;
