//! # dpi-engine
//!
//! Reference capture → inspect pipeline over a shared [`dpi_core::SlotPool`].
//!
//! Capture workers lease a slot, let a [`PacketSource`] write a frame into it and
//! wrap it in a [`dpi_core::PacketJob`]; inspection workers run an [`Inspector`]
//! over each job and drop it, which returns the slot. Exhaustion of the pool is
//! backpressure: the frame is discarded and counted.

pub mod error;
pub mod inspect;
pub mod pipeline;
pub mod source;
pub mod stress;

pub use error::EngineError;
pub use inspect::{FlowInspector, Inspector};
pub use pipeline::{Pipeline, RunReport};
pub use source::{PacketSource, SyntheticSource};
pub use stress::{run_stress, StressPlan, StressReport};
