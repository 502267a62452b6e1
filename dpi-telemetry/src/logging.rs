//! ## dpi-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! ### Expectations:
//! - Nothing is logged per packet on the hot path
//! - Recurring conditions (pool exhaustion, rejected frames) are throttled

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug)]
pub struct Logger;

impl Logger {
    /// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
    /// Fails if a global subscriber is already set.
    pub fn try_init(
        default_level: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level.to_ascii_lowercase())),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
    }
}

/// Lets one event through per interval; shared across threads.
#[derive(Debug)]
pub struct Throttle {
    origin: Instant,
    interval_ns: u64,
    // Nanoseconds since `origin` of the last allowed event, plus one; 0 = never.
    last: AtomicU64,
    suppressed: AtomicU64,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            interval_ns: interval.as_nanos().min(u128::from(u64::MAX)) as u64,
            last: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Returns `Some(n)` when the caller should log now, where `n` is the number
    /// of events suppressed since the previous allowed one.
    pub fn allow(&self) -> Option<u64> {
        let now = (self.origin.elapsed().as_nanos().min(u128::from(u64::MAX - 1)) as u64) + 1;
        let last = self.last.load(Ordering::Relaxed);
        let due = last == 0 || now.saturating_sub(last) >= self.interval_ns;
        if due
            && self
                .last
                .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            return Some(self.suppressed.swap(0, Ordering::Relaxed));
        }
        self.suppressed.fetch_add(1, Ordering::Relaxed);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn first_event_always_passes() {
        let throttle = Throttle::new(Duration::from_secs(3600));
        assert_eq!(throttle.allow(), Some(0));
        assert_eq!(throttle.allow(), None);
        assert_eq!(throttle.allow(), None);
    }

    #[test]
    fn reports_suppressed_count_after_interval() {
        let throttle = Throttle::new(Duration::from_millis(5));
        assert_eq!(throttle.allow(), Some(0));
        assert_eq!(throttle.allow(), None);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(throttle.allow(), Some(1));
    }

    #[test]
    fn zero_interval_never_suppresses() {
        let throttle = Throttle::new(Duration::ZERO);
        for _ in 0..10 {
            assert_eq!(throttle.allow(), Some(0));
        }
    }

    #[traced_test]
    #[test]
    fn throttled_warning_is_logged_once() {
        let throttle = Throttle::new(Duration::from_secs(3600));
        for _ in 0..5 {
            if let Some(suppressed) = throttle.allow() {
                tracing::warn!(suppressed, "Slot pool exhausted");
            }
        }
        assert!(logs_contain("Slot pool exhausted"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("Slot pool exhausted")).count() {
                1 => Ok(()),
                n => Err(format!("expected one warning, saw {n}")),
            }
        });
    }
}
