//! # Archive bus
//!
//! A `BusTransport` which writes every frame to a CSV file in the session
//! archive instead of a real bus. Used when replaying drive scripts.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use can_if::bus::{BusError, BusFrame, BusTransport};
use util::{
    archive::{ArchiveError, Archiver},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Bus transport writing to the session archive.
#[derive(Default)]
pub struct ArchiveBus {
    arch: Archiver,

    /// Time stamped onto frames sent until the next `set_time`
    time_s: f64,

    num_sent: u64,
}

/// One archived frame.
#[derive(Serialize)]
struct FrameRecord {
    time_s: f64,
    bus: u8,
    id: u32,
    len: u8,
    data: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArchiveBus {
    /// Create a new bus archiving to `bus/frames.csv` in the session.
    pub fn new(session: &Session) -> Result<Self, ArchiveError> {
        Ok(Self {
            arch: Archiver::from_path(session, "bus/frames.csv")?,
            ..Default::default()
        })
    }

    /// Set the time stamped onto subsequent frames.
    pub fn set_time(&mut self, time_s: f64) {
        self.time_s = time_s;
    }

    /// Total number of frames archived.
    pub fn num_sent(&self) -> u64 {
        self.num_sent
    }
}

impl BusTransport for ArchiveBus {
    fn send(&mut self, frames: &[BusFrame]) -> Result<(), BusError> {
        if !self.arch.is_init() {
            return Err(BusError::NotAvailable);
        }

        for f in frames {
            self.arch
                .serialise(FrameRecord {
                    time_s: self.time_s,
                    bus: f.bus,
                    id: f.id,
                    len: f.len,
                    data: f.hex(),
                })
                .map_err(|e| BusError::SendFailed(f.id, e.to_string()))?;

            self.num_sent += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_uninitialised_bus() {
        let mut bus = ArchiveBus::default();
        let frame = BusFrame::new(1191, 0, &[0x01, 0x00]);

        assert!(matches!(bus.send(&[frame]), Err(BusError::NotAvailable)));
        assert_eq!(bus.num_sent(), 0);
    }
}
