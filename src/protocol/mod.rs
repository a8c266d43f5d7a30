//! Controller logic built on the register access layer: bit timing, frame
//! codec, acceptance filters, event decoding, and the controller context
//! tying them to one register block.
pub mod controller;
pub mod events;
pub mod filter;
pub mod frame;
pub mod timing;
