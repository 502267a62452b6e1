//! Capture → inspect pipeline over one shared slot pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use dpi_config::{DpiConfig, PipelineConfig};
use dpi_core::alloc::{FreeListKind, PoolStatsSnapshot};
use dpi_core::flow::PacketAction;
use dpi_core::stats::{DpiStats, DpiStatsSnapshot};
use dpi_core::{PacketJob, SlotPool};
use dpi_telemetry::{MetricsRecorder, Throttle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::error::EngineError;
use crate::inspect::{FlowInspector, Inspector};
use crate::source::{PacketSource, SyntheticSource};

const LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub elapsed_ms: u64,
    pub slot_count: usize,
    pub strategy: FreeListKind,
    pub pool: PoolStatsSnapshot,
    pub packets: DpiStatsSnapshot,
    pub flows: usize,
}

/// Owns the pool, counters and inspector shared by every worker of a run.
pub struct Pipeline {
    config: PipelineConfig,
    pool: SlotPool,
    stats: Arc<DpiStats>,
    metrics: MetricsRecorder,
    inspector: Box<dyn Inspector>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        pool: SlotPool,
        stats: Arc<DpiStats>,
        metrics: MetricsRecorder,
        inspector: Box<dyn Inspector>,
    ) -> Self {
        Self {
            config,
            pool,
            stats,
            metrics,
            inspector,
        }
    }

    /// Builds the pool, a [`FlowInspector`] and fresh metrics from configuration.
    pub fn from_config(config: &DpiConfig) -> Result<Self, EngineError> {
        let pool = SlotPool::with_strategy(config.pool.slot_count, config.pool.free_list)?;
        let stats = Arc::new(DpiStats::new());
        let metrics =
            MetricsRecorder::new().map_err(|e| EngineError::Telemetry(e.to_string()))?;
        let inspector = FlowInspector::from_config(&config.classifier, stats.clone());

        Ok(Self::new(
            config.pipeline.clone(),
            pool,
            stats,
            metrics,
            Box::new(inspector),
        ))
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    pub fn stats(&self) -> &DpiStats {
        &self.stats
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn inspector(&self) -> &dyn Inspector {
        self.inspector.as_ref()
    }

    /// Runs with one [`SyntheticSource`] per capture worker.
    pub fn run_synthetic(&self) -> Result<RunReport, EngineError> {
        let seed = self.config.seed;
        let packets = self.config.packets_per_worker;
        let malformed_rate = self.config.malformed_rate;
        self.run(|worker| {
            SyntheticSource::new(seed.wrapping_add(worker as u64), packets)
                .with_malformed_rate(malformed_rate)
        })
    }

    /// Runs until every source is drained and every job inspected.
    ///
    /// `make_source(worker)` builds the source for capture worker `worker`.
    pub fn run<S, F>(&self, make_source: F) -> Result<RunReport, EngineError>
    where
        S: PacketSource + Send,
        F: FnMut(usize) -> S,
    {
        let span = info_span!(
            "pipeline",
            capture = self.config.capture_workers,
            inspect = self.config.inspect_workers,
            slots = self.pool.capacity(),
        );
        let _enter = span.enter();
        info!("Starting pipeline");

        let started = Instant::now();
        let sources: Vec<S> = (0..self.config.capture_workers).map(make_source).collect();
        let (tx, rx) = channel::bounded::<PacketJob<'_>>(self.config.queue_depth);
        let exhausted_log = Throttle::new(LOG_INTERVAL);
        let rejected_log = Throttle::new(LOG_INTERVAL);

        crossbeam::thread::scope(|s| -> Result<(), EngineError> {
            for (worker, source) in sources.into_iter().enumerate() {
                let tx = tx.clone();
                let (exhausted_log, rejected_log) = (&exhausted_log, &rejected_log);
                s.builder()
                    .name(format!("capture-{worker}"))
                    .spawn(move |_| self.capture_loop(source, tx, exhausted_log, rejected_log))?;
            }
            drop(tx);

            for worker in 0..self.config.inspect_workers {
                let rx = rx.clone();
                s.builder()
                    .name(format!("inspect-{worker}"))
                    .spawn(move |_| self.inspect_loop(rx))?;
            }
            // Producers must see a disconnect if every consumer is gone.
            drop(rx);
            Ok(())
        })
        .map_err(|_| EngineError::WorkerPanicked)??;

        self.metrics
            .observe_pool(self.pool.leased(), self.pool.available());

        let report = RunReport {
            elapsed_ms: started.elapsed().as_millis() as u64,
            slot_count: self.pool.capacity(),
            strategy: self.pool.strategy(),
            pool: self.pool.stats().snapshot(),
            packets: self.stats.snapshot(),
            flows: self.inspector.flow_count(),
        };
        info!(
            elapsed_ms = report.elapsed_ms,
            packets = report.packets.total_packets,
            dropped = report.packets.dropped_packets,
            exhausted = report.pool.exhausted,
            peak_leased = report.pool.peak_outstanding,
            "Pipeline finished"
        );
        Ok(report)
    }

    fn capture_loop<'p, S: PacketSource>(
        &'p self,
        mut source: S,
        tx: Sender<PacketJob<'p>>,
        exhausted_log: &Throttle,
        rejected_log: &Throttle,
    ) {
        let mut produced = 0u64;
        loop {
            let mut lease = match self.pool.acquire() {
                Ok(lease) => lease,
                Err(exhausted) => {
                    // Only a frame that actually existed counts as dropped.
                    if !source.discard() {
                        break;
                    }
                    self.stats.record_dropped();
                    self.metrics.inc_dropped();
                    self.metrics.inc_pool_exhausted();
                    if let Some(suppressed) = exhausted_log.allow() {
                        warn!(suppressed, "{exhausted}, dropping frame");
                    }
                    std::thread::yield_now();
                    continue;
                }
            };

            let Some(meta) = source.next_frame(lease.as_mut_slice()) else {
                break;
            };
            let (len, protocol) = (meta.data_len, meta.tuple.protocol);

            match PacketJob::new(lease, meta) {
                Ok(job) => {
                    if tx.send(job).is_err() {
                        warn!("Inspection stage gone, stopping capture");
                        break;
                    }
                    produced += 1;
                }
                Err(err) => {
                    self.stats.record_packet(len, protocol);
                    self.stats.record_dropped();
                    self.metrics.inc_dropped();
                    if let Some(suppressed) = rejected_log.allow() {
                        warn!(suppressed, %err, "Rejected frame");
                    }
                }
            }
        }
        debug!(produced, "Capture worker finished");
    }

    fn inspect_loop(&self, rx: Receiver<PacketJob<'_>>) {
        let mut inspected = 0u64;
        for job in rx.iter() {
            let started = Instant::now();
            self.stats.record_packet(job.len(), job.tuple().protocol);

            match self.inspector.inspect(&job) {
                PacketAction::Drop => {
                    self.stats.record_dropped();
                    self.metrics.inc_dropped();
                }
                _ => self.stats.record_forwarded(),
            }
            job.finish();

            self.metrics.inc_packets();
            self.metrics.observe_inspect_latency(started.elapsed());
            inspected += 1;
        }
        debug!(inspected, "Inspect worker finished");
    }
}
