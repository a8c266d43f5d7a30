//! `twaifd-hal` library: hardware abstraction for the TWAI-FD (CAN / CAN-FD)
//! controller in a `no_std` environment. The crate exposes the register
//! access layer (infra) and the controller logic (bit timing, frame codec,
//! acceptance filters, TX/RX engine, event decoding and lifecycle).
#![no_std]
//==================================================================================
/// Plain data types and constants shared by every module.
pub mod core;
/// Configuration-time errors and latched bus-error reasons.
pub mod error;
/// Typed access to the controller's memory-mapped register block.
pub mod infra;
/// Controller logic: timing, frames, filters, events and lifecycle.
pub mod protocol;
//==================================================================================
pub use crate::core::{ClockSource, ErrorState, Events};
pub use crate::error::{BusErrorReason, TimingError, TwaiError};
pub use crate::infra::registers::{MmioRegisters, RegisterBlock};
pub use crate::protocol::controller::{config::ControllerConfig, Controller};
pub use crate::protocol::frame::{FrameHeader, TwaiFrame};
