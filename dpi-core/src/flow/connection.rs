//! Per-flow record kept by a flow table.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::tuple::FiveTuple;
use crate::classify::AppTag;
use crate::packet::tcp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    New,
    Established,
    Classified,
    Blocked,
    Closed,
}

impl ConnectionState {
    /// Applies a transition, ignoring any that would move backwards.
    ///
    /// `Closed` is reachable from every state and never left.
    pub fn advance(self, next: ConnectionState) -> ConnectionState {
        match (self, next) {
            (ConnectionState::Closed, _) => ConnectionState::Closed,
            (_, ConnectionState::Closed) => ConnectionState::Closed,
            (current, next) if next > current => next,
            (current, _) => current,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}

/// What the forwarding stage should do with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketAction {
    #[default]
    Forward,
    Drop,
    Inspect,
    LogOnly,
}

/// Side of the flow a packet travelled on, relative to the first packet seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Per-flow accumulator.
#[derive(Debug, Clone)]
pub struct Connection {
    pub tuple: FiveTuple,
    pub state: ConnectionState,
    pub app: AppTag,
    pub server_name: Option<Arc<str>>,

    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub first_seen: Instant,
    pub last_seen: Instant,

    pub action: PacketAction,

    pub syn_seen: bool,
    pub syn_ack_seen: bool,
    pub fin_seen: bool,
}

impl Connection {
    pub fn new(tuple: FiveTuple, now: Instant) -> Self {
        Self {
            tuple,
            state: ConnectionState::New,
            app: AppTag::UNKNOWN,
            server_name: None,
            packets_in: 0,
            packets_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            first_seen: now,
            last_seen: now,
            action: PacketAction::Forward,
            syn_seen: false,
            syn_ack_seen: false,
            fin_seen: false,
        }
    }

    pub fn record(&mut self, direction: Direction, bytes: usize, now: Instant) {
        match direction {
            Direction::Outbound => {
                self.packets_out += 1;
                self.bytes_out += bytes as u64;
            }
            Direction::Inbound => {
                self.packets_in += 1;
                self.bytes_in += bytes as u64;
            }
        }
        self.last_seen = now;
    }

    /// Notes handshake and teardown flags. A SYN+ACK establishes the flow;
    /// FIN or RST closes it.
    pub fn observe_tcp_flags(&mut self, flags: u8) {
        if flags & tcp::SYN != 0 {
            if flags & tcp::ACK != 0 {
                self.syn_ack_seen = true;
                self.state = self.state.advance(ConnectionState::Established);
            } else {
                self.syn_seen = true;
            }
        }
        if flags & (tcp::FIN | tcp::RST) != 0 {
            self.fin_seen = flags & tcp::FIN != 0 || self.fin_seen;
            self.close();
        }
    }

    pub fn classify(&mut self, app: AppTag, server_name: Arc<str>) {
        self.app = app;
        self.server_name = Some(server_name);
        self.state = self.state.advance(ConnectionState::Classified);
    }

    pub fn block(&mut self) {
        self.action = PacketAction::Drop;
        self.state = self.state.advance(ConnectionState::Blocked);
    }

    pub fn close(&mut self) {
        self.state = self.state.advance(ConnectionState::Closed);
    }

    pub fn total_packets(&self) -> u64 {
        self.packets_in + self.packets_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::PROTO_TCP;

    fn conn() -> Connection {
        Connection::new(FiveTuple::new(1, 2, 1000, 443, PROTO_TCP), Instant::now())
    }

    #[test]
    fn state_only_moves_forward() {
        use ConnectionState::*;
        assert_eq!(New.advance(Classified), Classified);
        assert_eq!(Classified.advance(Established), Classified);
        assert_eq!(Blocked.advance(New), Blocked);
        assert_eq!(Established.advance(Closed), Closed);
        assert_eq!(Closed.advance(Blocked), Closed);
        assert!(Closed.is_terminal());
    }

    #[test]
    fn record_splits_by_direction() {
        let mut c = conn();
        let now = Instant::now();
        c.record(Direction::Outbound, 100, now);
        c.record(Direction::Inbound, 40, now);
        c.record(Direction::Inbound, 60, now);

        assert_eq!((c.packets_out, c.bytes_out), (1, 100));
        assert_eq!((c.packets_in, c.bytes_in), (2, 100));
        assert_eq!(c.total_packets(), 3);
    }

    #[test]
    fn handshake_and_teardown() {
        let mut c = conn();
        c.observe_tcp_flags(tcp::SYN);
        assert!(c.syn_seen);
        assert_eq!(c.state, ConnectionState::New);

        c.observe_tcp_flags(tcp::SYN | tcp::ACK);
        assert!(c.syn_ack_seen);
        assert_eq!(c.state, ConnectionState::Established);

        c.observe_tcp_flags(tcp::FIN | tcp::ACK);
        assert!(c.fin_seen);
        assert_eq!(c.state, ConnectionState::Closed);
    }

    #[test]
    fn block_sets_drop_action() {
        let mut c = conn();
        c.classify(AppTag::UNKNOWN, Arc::from("example.org"));
        c.block();
        assert_eq!(c.action, PacketAction::Drop);
        assert_eq!(c.state, ConnectionState::Blocked);
    }
}
