//! Five-tuple flow key.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// (source address, destination address, source port, destination port, protocol).
///
/// Byte order is whatever the capture layer supplies; nothing here converts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FiveTuple {
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
}

impl FiveTuple {
    pub fn new(src_ip: u32, dst_ip: u32, src_port: u16, dst_port: u16, protocol: u8) -> Self {
        Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            protocol,
        }
    }

    /// The same flow seen from the other endpoint.
    #[inline]
    pub fn reverse(&self) -> Self {
        Self {
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
            protocol: self.protocol,
        }
    }

    #[inline]
    pub fn is_tcp(&self) -> bool {
        self.protocol == PROTO_TCP
    }

    #[inline]
    pub fn is_udp(&self) -> bool {
        self.protocol == PROTO_UDP
    }
}

impl fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let proto = match self.protocol {
            PROTO_TCP => "TCP",
            PROTO_UDP => "UDP",
            _ => "?",
        };
        write!(
            f,
            "{}:{} -> {}:{} ({} {})",
            Ipv4Addr::from(self.src_ip),
            self.src_port,
            Ipv4Addr::from(self.dst_ip),
            self.dst_port,
            proto,
            self.protocol
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> FiveTuple {
        FiveTuple::new(0xC0A8_0001, 0x0808_0808, 51_000, 443, PROTO_TCP)
    }

    #[test]
    fn reverse_swaps_endpoints() {
        let t = sample();
        let r = t.reverse();
        assert_eq!(r.src_ip, t.dst_ip);
        assert_eq!(r.dst_port, t.src_port);
        assert_eq!(r.protocol, t.protocol);
        assert_ne!(r, t);
    }

    #[test]
    fn display_renders_dotted_quads() {
        assert_eq!(
            sample().to_string(),
            "192.168.0.1:51000 -> 8.8.8.8:443 (TCP 6)"
        );
    }

    proptest! {
        #[test]
        fn reverse_is_an_involution(
            src_ip in any::<u32>(),
            dst_ip in any::<u32>(),
            src_port in any::<u16>(),
            dst_port in any::<u16>(),
            protocol in any::<u8>(),
        ) {
            let t = FiveTuple::new(src_ip, dst_ip, src_port, dst_port, protocol);
            prop_assert_eq!(t.reverse().reverse(), t);
            if (src_ip, src_port) != (dst_ip, dst_port) {
                prop_assert_ne!(t.reverse(), t);
            }
        }
    }
}
