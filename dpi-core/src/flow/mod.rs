//! ## dpi-core::flow
//! **Flow keys and per-flow records**
//!
//! Thin types shared with the flow table; nothing here touches the slot pool.

pub mod connection;
pub mod tuple;

pub use connection::{Connection, ConnectionState, Direction, PacketAction};
pub use tuple::{FiveTuple, PROTO_TCP, PROTO_UDP};
