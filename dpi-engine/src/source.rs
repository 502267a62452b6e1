//! Frame producers for the capture stage.
//!
//! Capturing and parsing real traffic is someone else's job; a [`PacketSource`]
//! is the seam where it plugs in. [`SyntheticSource`] stands in for it with
//! generated Ethernet/IPv4 frames whose layer offsets are known by construction.

use std::sync::Arc;
use std::time::Instant;

use dpi_core::flow::{FiveTuple, PROTO_TCP, PROTO_UDP};
use dpi_core::packet::{tcp, FrameMeta, LayerOffsets, Timestamp};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Produces frames into caller-provided slot buffers.
pub trait PacketSource {
    /// Writes the next frame into `buf` and describes it; `None` ends the stream.
    fn next_frame(&mut self, buf: &mut [u8]) -> Option<FrameMeta>;

    /// Skips the next frame because there was nowhere to put it. Returns `false`
    /// once the stream has ended.
    fn discard(&mut self) -> bool;
}

const ETH_LEN: usize = 14;
const IPV4_LEN: usize = 20;
const TCP_LEN: usize = 20;
const UDP_LEN: usize = 8;
const MAX_PAYLOAD: usize = 1460;
const FLOWS: usize = 32;

/// Server names attached to generated HTTPS flows.
pub const SAMPLE_SERVER_NAMES: &[&str] = &[
    "www.youtube.com",
    "github.com",
    "www.netflix.com",
    "discord.com",
    "example.org",
];

#[derive(Debug, Clone)]
struct SyntheticFlow {
    tuple: FiveTuple,
    server_name: Option<Arc<str>>,
    sent: u64,
}

/// Seeded generator of well-formed (and optionally malformed) frames.
#[derive(Debug)]
pub struct SyntheticSource {
    rng: SmallRng,
    flows: Vec<SyntheticFlow>,
    remaining: u64,
    next_id: u64,
    malformed_rate: f64,
    started: Instant,
}

impl SyntheticSource {
    /// A source yielding `packets` frames over a fixed set of flows.
    pub fn new(seed: u64, packets: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let names: Vec<Arc<str>> = SAMPLE_SERVER_NAMES.iter().map(|n| Arc::from(*n)).collect();

        let flows = (0..FLOWS)
            .map(|i| {
                let tcp = i % 4 != 3;
                let (protocol, dst_port) = if tcp { (PROTO_TCP, 443) } else { (PROTO_UDP, 53) };
                let tuple = FiveTuple::new(
                    0x0A00_0000 | rng.random_range(1..=0xFFFFu32),
                    0x5DB8_0000 | rng.random_range(1..=0xFFFFu32),
                    rng.random_range(1024..=u16::MAX),
                    dst_port,
                    protocol,
                );
                let server_name = tcp.then(|| names[i % names.len()].clone());
                SyntheticFlow {
                    tuple,
                    server_name,
                    sent: 0,
                }
            })
            .collect();

        Self {
            rng,
            flows,
            remaining: packets,
            next_id: 0,
            malformed_rate: 0.0,
            started: Instant::now(),
        }
    }

    /// Emits frames with out-of-order layer offsets at `rate` (0.0..=1.0).
    pub fn with_malformed_rate(mut self, rate: f64) -> Self {
        self.malformed_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn timestamp(&self) -> Timestamp {
        let elapsed = self.started.elapsed();
        Timestamp {
            sec: elapsed.as_secs() as u32,
            usec: elapsed.subsec_micros(),
        }
    }
}

fn put(buf: &mut [u8], at: usize, bytes: &[u8]) {
    buf[at..at + bytes.len()].copy_from_slice(bytes);
}

fn tcp_flags_for(sent: u64, closing: bool) -> u8 {
    match sent {
        0 => tcp::SYN,
        1 => tcp::SYN | tcp::ACK,
        _ if closing => tcp::FIN | tcp::ACK,
        _ => tcp::PSH | tcp::ACK,
    }
}

impl PacketSource for SyntheticSource {
    fn next_frame(&mut self, buf: &mut [u8]) -> Option<FrameMeta> {
        // A buffer that cannot hold the largest header stack ends the stream.
        if self.remaining == 0 || buf.len() < ETH_LEN + IPV4_LEN + TCP_LEN {
            return None;
        }
        self.remaining -= 1;

        let flow_index = self.rng.random_range(0..self.flows.len());
        let inbound = self.flows[flow_index].sent > 0 && self.rng.random_bool(0.4);
        let closing = self.rng.random_bool(0.01);
        let flow = &mut self.flows[flow_index];
        let tuple = if inbound {
            flow.tuple.reverse()
        } else {
            flow.tuple
        };

        let l4_len = if tuple.protocol == PROTO_TCP {
            TCP_LEN
        } else {
            UDP_LEN
        };
        let headers = ETH_LEN + IPV4_LEN + l4_len;
        let room = buf.len().saturating_sub(headers).min(MAX_PAYLOAD);
        let payload_len = self.rng.random_range(0..=room);
        let data_len = headers + payload_len;

        // Ethernet: zero MACs, IPv4 ethertype.
        buf[..12].fill(0);
        put(buf, 12, &0x0800u16.to_be_bytes());
        // IPv4, no options.
        let ip = ETH_LEN;
        buf[ip] = 0x45;
        buf[ip + 1] = 0;
        put(buf, ip + 2, &((data_len - ETH_LEN) as u16).to_be_bytes());
        buf[ip + 4..ip + 8].fill(0);
        buf[ip + 8] = 64;
        buf[ip + 9] = tuple.protocol;
        buf[ip + 10..ip + 12].fill(0);
        put(buf, ip + 12, &tuple.src_ip.to_be_bytes());
        put(buf, ip + 16, &tuple.dst_ip.to_be_bytes());
        // Transport ports, remaining header bytes zeroed.
        let transport = ip + IPV4_LEN;
        put(buf, transport, &tuple.src_port.to_be_bytes());
        put(buf, transport + 2, &tuple.dst_port.to_be_bytes());
        buf[transport + 4..transport + l4_len].fill(0);

        let payload = transport + l4_len;
        let id = self.next_id;
        buf[payload..data_len].fill(id as u8);

        let tcp_flags = if tuple.protocol == PROTO_TCP {
            let flags = tcp_flags_for(flow.sent, closing);
            buf[transport + 13] = flags;
            flags
        } else {
            0
        };
        flow.sent += 1;
        let server_name = flow.server_name.clone();
        self.next_id += 1;

        let mut offsets = LayerOffsets {
            eth: 0,
            ip,
            transport,
            payload,
            payload_len,
        };
        if self.malformed_rate > 0.0 && self.rng.random_bool(self.malformed_rate) {
            offsets.transport = offsets.ip - 1;
        }

        Some(FrameMeta {
            id,
            data_len,
            offsets,
            tuple,
            tcp_flags,
            timestamp: self.timestamp(),
            server_name,
        })
    }

    fn discard(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.next_id += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpi_core::SLOT_SIZE;

    #[test]
    fn frames_are_well_formed() {
        let mut source = SyntheticSource::new(7, 200);
        let mut buf = [0u8; SLOT_SIZE];
        let mut count = 0;
        while let Some(meta) = source.next_frame(&mut buf) {
            meta.offsets.validate(meta.data_len).unwrap();
            assert_eq!(&buf[12..14], &[0x08, 0x00]);
            assert_eq!(buf[meta.offsets.ip] >> 4, 4);
            assert_eq!(buf[meta.offsets.ip + 9], meta.tuple.protocol);
            let src_port = u16::from_be_bytes([
                buf[meta.offsets.transport],
                buf[meta.offsets.transport + 1],
            ]);
            assert_eq!(src_port, meta.tuple.src_port);
            count += 1;
        }
        assert_eq!(count, 200);
    }

    #[test]
    fn same_seed_same_traffic() {
        let mut a = SyntheticSource::new(42, 50);
        let mut b = SyntheticSource::new(42, 50);
        let (mut buf_a, mut buf_b) = ([0u8; SLOT_SIZE], [0u8; SLOT_SIZE]);
        while let (Some(x), Some(y)) = (a.next_frame(&mut buf_a), b.next_frame(&mut buf_b)) {
            assert_eq!(x.tuple, y.tuple);
            assert_eq!(x.data_len, y.data_len);
            assert_eq!(&buf_a[..x.data_len], &buf_b[..y.data_len]);
        }
    }

    #[test]
    fn first_tcp_packet_of_a_flow_is_syn() {
        let mut source = SyntheticSource::new(3, 500);
        let mut buf = [0u8; SLOT_SIZE];
        let mut seen = std::collections::HashSet::new();
        while let Some(meta) = source.next_frame(&mut buf) {
            if meta.tuple.is_tcp() && seen.insert(meta.tuple) && seen.insert(meta.tuple.reverse()) {
                assert_eq!(meta.tcp_flags, tcp::SYN);
            }
        }
    }

    #[test]
    fn malformed_frames_fail_validation() {
        let mut source = SyntheticSource::new(1, 20).with_malformed_rate(1.0);
        let mut buf = [0u8; SLOT_SIZE];
        while let Some(meta) = source.next_frame(&mut buf) {
            assert!(meta.offsets.validate(meta.data_len).is_err());
        }
    }

    #[test]
    fn discard_consumes_the_budget() {
        let mut source = SyntheticSource::new(1, 2);
        assert!(source.discard());
        assert!(source.discard());
        assert!(!source.discard());
        assert!(source.next_frame(&mut [0u8; SLOT_SIZE]).is_none());
    }

    #[test]
    fn buffer_shorter_than_headers_yields_nothing() {
        let mut source = SyntheticSource::new(5, 10);
        assert!(source.next_frame(&mut [0u8; 20]).is_none());
        assert!(source.next_frame(&mut [0u8; 0]).is_none());
        assert_eq!(source.remaining(), 10);
    }

    #[test]
    fn small_buffers_are_respected() {
        let mut source = SyntheticSource::new(9, 100);
        let mut buf = [0u8; 128];
        while let Some(meta) = source.next_frame(&mut buf) {
            assert!(meta.data_len <= buf.len());
        }
    }
}
