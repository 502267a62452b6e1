//! Inspection stage.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use dpi_core::classify::{AppRegistry, AppTag, RuleTable, SniClassifier};
use dpi_core::flow::{Connection, Direction, FiveTuple, PacketAction};
use dpi_core::stats::DpiStats;
use dpi_core::PacketJob;
use parking_lot::Mutex;
use tracing::debug;

use dpi_config::ClassifierConfig;

/// Decides what happens to one packet. Runs on inspection workers.
pub trait Inspector: Send + Sync {
    fn inspect(&self, job: &PacketJob<'_>) -> PacketAction;

    /// Flows currently tracked, if the inspector keeps any.
    fn flow_count(&self) -> usize {
        0
    }
}

/// Flow-table inspector: per-flow counters, TCP handshake tracking, SNI
/// classification and app blocking.
pub struct FlowInspector {
    flows: Mutex<HashMap<FiveTuple, Connection>>,
    classifier: Box<dyn SniClassifier>,
    registry: AppRegistry,
    blocked: HashSet<AppTag>,
    stats: Arc<DpiStats>,
}

impl FlowInspector {
    pub fn new(
        classifier: Box<dyn SniClassifier>,
        registry: AppRegistry,
        blocked: HashSet<AppTag>,
        stats: Arc<DpiStats>,
    ) -> Self {
        Self {
            flows: Mutex::new(HashMap::new()),
            classifier,
            registry,
            blocked,
            stats,
        }
    }

    /// Builds the rule table and block list from configuration.
    pub fn from_config(config: &ClassifierConfig, stats: Arc<DpiStats>) -> Self {
        let mut registry = AppRegistry::with_defaults();
        let rules = RuleTable::from_pairs(
            config
                .rules
                .iter()
                .map(|(server, app)| (server.as_str(), app.as_str())),
            &mut registry,
        );
        let blocked = config
            .blocked_apps
            .iter()
            .map(|app| registry.register(app))
            .collect();
        debug!(rules = rules.len(), apps = registry.len(), "Classifier loaded");

        Self::new(Box::new(rules), registry, blocked, stats)
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    /// Copy of the record for `tuple`, looked up in either direction.
    pub fn flow(&self, tuple: &FiveTuple) -> Option<Connection> {
        let flows = self.flows.lock();
        flows
            .get(tuple)
            .or_else(|| flows.get(&tuple.reverse()))
            .cloned()
    }

    /// Packets per application name across all tracked flows.
    pub fn app_breakdown(&self) -> HashMap<String, u64> {
        let flows = self.flows.lock();
        let mut breakdown = HashMap::new();
        for conn in flows.values() {
            *breakdown
                .entry(self.registry.name(conn.app).to_string())
                .or_insert(0) += conn.total_packets();
        }
        breakdown
    }
}

impl Inspector for FlowInspector {
    fn inspect(&self, job: &PacketJob<'_>) -> PacketAction {
        let now = Instant::now();
        let tuple = *job.tuple();
        let reverse = tuple.reverse();

        let mut flows = self.flows.lock();
        let (key, direction) = if flows.contains_key(&tuple) {
            (tuple, Direction::Outbound)
        } else if flows.contains_key(&reverse) {
            (reverse, Direction::Inbound)
        } else {
            (tuple, Direction::Outbound)
        };
        let conn = flows.entry(key).or_insert_with(|| {
            self.stats.connection_opened();
            Connection::new(key, now)
        });

        conn.record(direction, job.len(), now);

        if tuple.is_tcp() {
            let was_closed = conn.state.is_terminal();
            conn.observe_tcp_flags(job.tcp_flags());
            if !was_closed && conn.state.is_terminal() {
                self.stats.connection_closed();
            }
        }

        if conn.server_name.is_none() {
            if let Some(name) = job.server_name() {
                let tag = self.classifier.classify(name);
                conn.classify(tag, name.clone());
                if self.blocked.contains(&tag) {
                    conn.block();
                }
            }
        }

        conn.action
    }

    fn flow_count(&self) -> usize {
        self.flows.lock().len()
    }
}
