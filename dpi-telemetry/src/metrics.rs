//! ## dpi-telemetry::metrics
//! **Prometheus exporter**
//!
//! Counters are bumped by pipeline stages; pool gauges are sampled, since the
//! pool keeps its own atomics and is never made to call into telemetry.

use std::time::Duration;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub packets: IntCounter,
    pub dropped: IntCounter,
    pub pool_exhausted: IntCounter,
    pub pool_leased: IntGauge,
    pub pool_available: IntGauge,
    pub inspect_latency: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let packets = IntCounter::new("dpi_packets_total", "Packets inspected")?;
        let dropped = IntCounter::new(
            "dpi_packets_dropped_total",
            "Packets dropped by backpressure, rejection or policy",
        )?;
        let pool_exhausted = IntCounter::new(
            "dpi_pool_exhausted_total",
            "Frames dropped because the slot pool was empty",
        )?;
        let pool_leased = IntGauge::new("dpi_pool_leased", "Slots currently leased")?;
        let pool_available = IntGauge::new("dpi_pool_available", "Slots on the free-list")?;
        let inspect_latency = Histogram::with_opts(
            HistogramOpts::new("dpi_inspect_latency_ns", "Per-packet inspection time")
                .buckets(vec![250.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0]),
        )?;

        registry.register(Box::new(packets.clone()))?;
        registry.register(Box::new(dropped.clone()))?;
        registry.register(Box::new(pool_exhausted.clone()))?;
        registry.register(Box::new(pool_leased.clone()))?;
        registry.register(Box::new(pool_available.clone()))?;
        registry.register(Box::new(inspect_latency.clone()))?;

        Ok(Self {
            registry,
            packets,
            dropped,
            pool_exhausted,
            pool_leased,
            pool_available,
            inspect_latency,
        })
    }

    #[inline]
    pub fn inc_packets(&self) {
        self.packets.inc();
    }

    #[inline]
    pub fn inc_dropped(&self) {
        self.dropped.inc();
    }

    #[inline]
    pub fn inc_pool_exhausted(&self) {
        self.pool_exhausted.inc();
    }

    #[inline]
    pub fn observe_inspect_latency(&self, elapsed: Duration) {
        self.inspect_latency.observe(elapsed.as_nanos() as f64);
    }

    /// Samples the pool's occupancy.
    pub fn observe_pool(&self, leased: usize, available: usize) {
        self.pool_leased.set(leased as i64);
        self.pool_available.set(available as i64);
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_registered_series() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.inc_packets();
        metrics.inc_packets();
        metrics.inc_dropped();
        metrics.observe_pool(3, 61);
        metrics.observe_inspect_latency(Duration::from_micros(2));

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("dpi_packets_total 2"));
        assert!(text.contains("dpi_packets_dropped_total 1"));
        assert!(text.contains("dpi_pool_leased 3"));
        assert!(text.contains("dpi_pool_available 61"));
        assert!(text.contains("dpi_inspect_latency_ns_count 1"));
    }

    #[test]
    fn recorders_are_independent() {
        let a = MetricsRecorder::new().unwrap();
        let b = MetricsRecorder::new().unwrap();
        a.inc_pool_exhausted();
        assert_eq!(a.pool_exhausted.get(), 1);
        assert_eq!(b.pool_exhausted.get(), 0);
    }
}
