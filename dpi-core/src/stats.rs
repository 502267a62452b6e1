//! ## dpi-core::stats
//! **Pipeline-wide packet counters**
//!
//! Shared by reference (or `Arc`) between every stage. Relaxed atomics only.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::flow::{PROTO_TCP, PROTO_UDP};

#[derive(Debug, Default)]
pub struct DpiStats {
    total_packets: AtomicU64,
    total_bytes: AtomicU64,
    forwarded_packets: AtomicU64,
    dropped_packets: AtomicU64,
    tcp_packets: AtomicU64,
    udp_packets: AtomicU64,
    other_packets: AtomicU64,
    active_connections: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DpiStatsSnapshot {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub forwarded_packets: u64,
    pub dropped_packets: u64,
    pub tcp_packets: u64,
    pub udp_packets: u64,
    pub other_packets: u64,
    pub active_connections: u64,
}

impl DpiStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one captured packet of `len` bytes by transport protocol.
    #[inline]
    pub fn record_packet(&self, len: usize, protocol: u8) {
        self.total_packets.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(len as u64, Ordering::Relaxed);
        let counter = match protocol {
            PROTO_TCP => &self.tcp_packets,
            PROTO_UDP => &self.udp_packets,
            _ => &self.other_packets,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_forwarded(&self) {
        self.forwarded_packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.dropped_packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connection_closed(&self) {
        // Saturating: a close racing a snapshot must not wrap.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn total_packets(&self) -> u64 {
        self.total_packets.load(Ordering::Relaxed)
    }

    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets.load(Ordering::Relaxed)
    }

    pub fn forwarded_packets(&self) -> u64 {
        self.forwarded_packets.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DpiStatsSnapshot {
        DpiStatsSnapshot {
            total_packets: self.total_packets.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            forwarded_packets: self.forwarded_packets.load(Ordering::Relaxed),
            dropped_packets: self.dropped_packets.load(Ordering::Relaxed),
            tcp_packets: self.tcp_packets.load(Ordering::Relaxed),
            udp_packets: self.udp_packets.load(Ordering::Relaxed),
            other_packets: self.other_packets.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_protocol() {
        let stats = DpiStats::new();
        stats.record_packet(60, PROTO_TCP);
        stats.record_packet(80, PROTO_UDP);
        stats.record_packet(40, 1);

        let snap = stats.snapshot();
        assert_eq!(snap.total_packets, 3);
        assert_eq!(snap.total_bytes, 180);
        assert_eq!((snap.tcp_packets, snap.udp_packets, snap.other_packets), (1, 1, 1));
    }

    #[test]
    fn active_connections_never_wrap() {
        let stats = DpiStats::new();
        stats.connection_opened();
        stats.connection_closed();
        stats.connection_closed();
        assert_eq!(stats.active_connections(), 0);
    }

    #[test]
    fn shared_across_threads() {
        let stats = std::sync::Arc::new(DpiStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_forwarded();
                        stats.record_dropped();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.forwarded_packets(), 4000);
        assert_eq!(stats.dropped_packets(), 4000);
    }
}
