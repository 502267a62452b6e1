//! ## dpi-core::packet
//! **Packet descriptors over pool slots**
//!
//! The capture stage writes a frame into a leased slot and wraps the lease in a
//! [`PacketJob`]; the inspection stage reads it in place and drops it, which
//! returns the slot.

pub mod job;

pub use job::{DescriptorError, FrameMeta, LayerOffsets, PacketJob, Timestamp};

/// TCP header flag bits as carried in [`PacketJob::tcp_flags`].
pub mod tcp {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
}
