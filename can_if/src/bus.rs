//! # Bus frames and transport

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use thiserror::Error;

use crate::frame::MAX_FRAME_LEN;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A frame ready for transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusFrame {
    /// Message id
    pub id: u32,

    /// Bus index the frame is sent on
    pub bus: u8,

    /// Number of valid bytes in `data`
    pub len: u8,

    pub data: [u8; MAX_FRAME_LEN],
}

/// A transport which keeps every frame sent to it, for tests and replay.
#[derive(Debug, Default, Clone)]
pub struct MemoryBus {
    pub sent: Vec<BusFrame>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Transport is not available")]
    NotAvailable,

    #[error("Could not send frame {0}: {1}")]
    SendFailed(u32, String),
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something that can put frames on a bus.
///
/// Frames are sent in order, once per control cycle.
pub trait BusTransport {
    fn send(&mut self, frames: &[BusFrame]) -> Result<(), BusError>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BusFrame {
    /// Create a frame from a payload of at most 8 bytes. Longer payloads are
    /// truncated.
    pub fn new(id: u32, bus: u8, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_FRAME_LEN);
        let mut data = [0u8; MAX_FRAME_LEN];
        data[..len].copy_from_slice(&payload[..len]);

        Self {
            id,
            bus,
            len: len as u8,
            data,
        }
    }

    /// The valid part of the payload.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// The payload as a hex string, e.g. `"0a1b"`.
    pub fn hex(&self) -> String {
        self.payload().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl BusTransport for MemoryBus {
    fn send(&mut self, frames: &[BusFrame]) -> Result<(), BusError> {
        self.sent.extend_from_slice(frames);
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bus_frame() {
        let f = BusFrame::new(1191, 0, &[0x01, 0x00]);
        assert_eq!(f.payload(), &[0x01, 0x00]);
        assert_eq!(f.hex(), "0100");

        let long = BusFrame::new(1, 1, &[0xff; 10]);
        assert_eq!(long.len, 8);

        let mut bus = MemoryBus::default();
        bus.send(&[f, long]).unwrap();
        assert_eq!(bus.sent, vec![f, long]);
    }
}
