//! ## dpi-core::packet::job
//! **Zero-copy descriptor over one leased slot**
//!
//! A [`PacketJob`] owns the [`SlotLease`] it describes, so it can never outlive
//! the lease or point into a slot that has been handed to someone else. Layer
//! offsets are validated once, at construction; a descriptor that exists is
//! well-formed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alloc::{SlotIndex, SlotLease, SLOT_SIZE};
use crate::flow::FiveTuple;

/// Rejection reasons for a descriptor. The packet is dropped and its slot
/// returned; nothing reaches the inspection stage.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Frame of {data_len} bytes exceeds the {}-byte slot", SLOT_SIZE)]
    FrameTooLarge { data_len: usize },

    #[error(
        "Layer offsets out of order: eth={eth} ip={ip} transport={transport} payload={payload}"
    )]
    OffsetsOutOfOrder {
        eth: usize,
        ip: usize,
        transport: usize,
        payload: usize,
    },

    #[error("Payload {payload}+{payload_len} overruns frame of {data_len} bytes")]
    PayloadOverrun {
        payload: usize,
        payload_len: usize,
        data_len: usize,
    },
}

/// Byte offsets of each protocol layer within the populated part of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerOffsets {
    pub eth: usize,
    pub ip: usize,
    pub transport: usize,
    pub payload: usize,
    pub payload_len: usize,
}

impl LayerOffsets {
    /// Checks `eth <= ip <= transport <= payload` and
    /// `payload + payload_len <= data_len <= SLOT_SIZE`.
    pub fn validate(&self, data_len: usize) -> Result<(), DescriptorError> {
        if data_len > SLOT_SIZE {
            return Err(DescriptorError::FrameTooLarge { data_len });
        }
        if !(self.eth <= self.ip && self.ip <= self.transport && self.transport <= self.payload) {
            return Err(DescriptorError::OffsetsOutOfOrder {
                eth: self.eth,
                ip: self.ip,
                transport: self.transport,
                payload: self.payload,
            });
        }
        match self.payload.checked_add(self.payload_len) {
            Some(end) if end <= data_len => Ok(()),
            _ => Err(DescriptorError::PayloadOverrun {
                payload: self.payload,
                payload_len: self.payload_len,
                data_len,
            }),
        }
    }
}

/// Capture timestamp, split as libpcap reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub sec: u32,
    pub usec: u32,
}

/// What the capture-side parser reports about the frame it wrote into a slot.
#[derive(Debug, Clone, Default)]
pub struct FrameMeta {
    pub id: u64,
    pub data_len: usize,
    pub offsets: LayerOffsets,
    pub tuple: FiveTuple,
    pub tcp_flags: u8,
    pub timestamp: Timestamp,
    /// Server name the parser already extracted, if any.
    pub server_name: Option<Arc<str>>,
}

/// Descriptor of one captured packet held in a leased slot.
#[derive(Debug)]
pub struct PacketJob<'pool> {
    lease: SlotLease<'pool>,
    id: u64,
    data_len: usize,
    offsets: LayerOffsets,
    tuple: FiveTuple,
    tcp_flags: u8,
    timestamp: Timestamp,
    server_name: Option<Arc<str>>,
}

impl<'pool> PacketJob<'pool> {
    /// Builds a descriptor over `lease`.
    ///
    /// On error the lease is dropped, which returns the slot to its pool.
    pub fn new(lease: SlotLease<'pool>, meta: FrameMeta) -> Result<Self, DescriptorError> {
        meta.offsets.validate(meta.data_len)?;
        Ok(Self {
            lease,
            id: meta.id,
            data_len: meta.data_len,
            offsets: meta.offsets,
            tuple: meta.tuple,
            tcp_flags: meta.tcp_flags,
            timestamp: meta.timestamp,
            server_name: meta.server_name,
        })
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn slot_index(&self) -> SlotIndex {
        self.lease.index()
    }

    #[inline]
    pub fn tuple(&self) -> &FiveTuple {
        &self.tuple
    }

    #[inline]
    pub fn tcp_flags(&self) -> u8 {
        self.tcp_flags
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    #[inline]
    pub fn server_name(&self) -> Option<&Arc<str>> {
        self.server_name.as_ref()
    }

    #[inline]
    pub fn offsets(&self) -> &LayerOffsets {
        &self.offsets
    }

    /// Populated bytes of the slot.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.lease.as_slice()[..self.data_len]
    }

    /// Bytes from the network header to the end of the frame.
    #[inline]
    pub fn l3(&self) -> &[u8] {
        &self.data()[self.offsets.ip..]
    }

    /// Bytes from the transport header to the end of the frame.
    #[inline]
    pub fn l4(&self) -> &[u8] {
        &self.data()[self.offsets.transport..]
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        let start = self.offsets.payload;
        &self.data()[start..start + self.offsets.payload_len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data_len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data_len == 0
    }

    /// Releases the slot. Same as dropping the descriptor.
    #[inline]
    pub fn finish(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::SlotPool;
    use crate::flow::PROTO_UDP;
    use proptest::prelude::*;

    fn udp_meta(data_len: usize) -> FrameMeta {
        FrameMeta {
            id: 7,
            data_len,
            offsets: LayerOffsets {
                eth: 0,
                ip: 14,
                transport: 34,
                payload: 42,
                payload_len: data_len - 42,
            },
            tuple: FiveTuple::new(1, 2, 5353, 53, PROTO_UDP),
            ..FrameMeta::default()
        }
    }

    #[test]
    fn exposes_layers_without_copying() {
        let pool = SlotPool::new(1).unwrap();
        let mut lease = pool.acquire().unwrap();
        let frame: Vec<u8> = (0..64u8).collect();
        lease.as_mut_slice()[..64].copy_from_slice(&frame);
        let slot_start = lease.as_slice().as_ptr();

        let job = PacketJob::new(lease, udp_meta(64)).unwrap();
        assert_eq!(job.data().as_ptr(), slot_start);
        assert_eq!(job.len(), 64);
        assert_eq!(job.l3()[0], 14);
        assert_eq!(job.l4()[0], 34);
        assert_eq!(job.payload(), &frame[42..64]);
        assert_eq!(job.id(), 7);
        assert!(job.tuple().is_udp());
    }

    #[test]
    fn rejected_descriptor_returns_its_slot() {
        let pool = SlotPool::new(1).unwrap();
        let lease = pool.acquire().unwrap();
        let mut meta = udp_meta(64);
        meta.offsets.transport = 10;

        let err = PacketJob::new(lease, meta).unwrap_err();
        assert!(matches!(err, DescriptorError::OffsetsOutOfOrder { .. }));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn finishing_returns_the_slot() {
        let pool = SlotPool::new(1).unwrap();
        let job = PacketJob::new(pool.acquire().unwrap(), udp_meta(64)).unwrap();
        let index = job.slot_index();
        assert!(pool.acquire().is_err());

        job.finish();
        assert_eq!(pool.acquire().unwrap().index(), index);
    }

    #[test]
    fn rejects_oversized_frame() {
        let offsets = LayerOffsets::default();
        assert_eq!(
            offsets.validate(SLOT_SIZE + 1),
            Err(DescriptorError::FrameTooLarge {
                data_len: SLOT_SIZE + 1
            })
        );
        assert!(offsets.validate(SLOT_SIZE).is_ok());
    }

    #[test]
    fn rejects_payload_overrun() {
        let offsets = LayerOffsets {
            eth: 0,
            ip: 14,
            transport: 34,
            payload: 54,
            payload_len: 100,
        };
        assert!(matches!(
            offsets.validate(120),
            Err(DescriptorError::PayloadOverrun { .. })
        ));
        assert!(offsets.validate(154).is_ok());
    }

    #[test]
    fn payload_length_cannot_wrap() {
        let offsets = LayerOffsets {
            payload: 10,
            payload_len: usize::MAX,
            ..LayerOffsets::default()
        };
        assert!(offsets.validate(SLOT_SIZE).is_err());
    }

    proptest! {
        #[test]
        fn accepted_descriptors_satisfy_the_offset_invariant(
            eth in 0usize..2200,
            ip in 0usize..2200,
            transport in 0usize..2200,
            payload in 0usize..2200,
            payload_len in 0usize..2200,
            data_len in 0usize..2200,
        ) {
            let pool = SlotPool::new(1).unwrap();
            let offsets = LayerOffsets { eth, ip, transport, payload, payload_len };
            let meta = FrameMeta { data_len, offsets, ..FrameMeta::default() };

            let holds = eth <= ip
                && ip <= transport
                && transport <= payload
                && payload + payload_len <= data_len
                && data_len <= SLOT_SIZE;

            let outcome = PacketJob::new(pool.acquire().unwrap(), meta);
            match outcome {
                Ok(job) => {
                    prop_assert!(holds);
                    let o = job.offsets();
                    prop_assert!(o.eth <= o.ip && o.ip <= o.transport && o.transport <= o.payload);
                    prop_assert!(o.payload + o.payload_len <= job.len());
                    prop_assert!(job.len() <= SLOT_SIZE);
                    prop_assert_eq!(job.payload().len(), payload_len);
                }
                Err(_) => {
                    prop_assert!(!holds);
                    prop_assert_eq!(pool.available(), 1);
                }
            };
        }
    }
}
