//! # CAN interface crate.
//!
//! Provides the wire-level pieces shared by the control software: checksum
//! algorithms, the layout driven frame codec, typed message records and the
//! bus transport interface.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Per-frame integrity checksums and variant detection
pub mod checksum;

/// Layout driven frame encoding and decoding
pub mod frame;

/// Typed records for the messages the controller synthesises
pub mod msgs;

/// Bus frames and the transport interface
pub mod bus;
