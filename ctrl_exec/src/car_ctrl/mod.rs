//! Car control module
//!
//! Converts the normalised steering and gas/brake commands into the vehicle's
//! CAN frames. Stock frames from the camera, cluster and power steering are
//! decoded and used both to detect the steering checksum variant and as the
//! source of fields which are passed through unmodified.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod hud;
mod params;
mod state;
mod steer_limits;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use hud::*;
pub use params::*;
pub use state::*;
pub use steer_limits::*;

use can_if::frame::ConfigError;
use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Acceleration changes smaller than this are ignored.
///
/// Units: meters/second^2
pub const ACCEL_HYST_GAP: f64 = 0.02;

/// Units: meters/second^2
pub const ACCEL_MAX: f64 = 1.5;

/// Units: meters/second^2
pub const ACCEL_MIN: f64 = -3.0;

/// Number of resume button frames sent in one burst.
pub const RESUME_BURST_FRAMES: u32 = 6;

/// Minimum number of frames between resume bursts.
pub const RESUME_GAP_FRAMES: u64 = 5;

/// Modulus of the cruise control request counter.
pub const SCC12_COUNTER_MODULUS: u64 = 15;

/// Periods, in frames, of the static messages sent when the camera is
/// disconnected.
pub const LKAS12_PERIOD: u64 = 10;
pub const MSG_1191_PERIOD: u64 = 50;
pub const MSG_1156_PERIOD: u64 = 7;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during CarCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum CarCtrlError {
    #[error("Could not load the CarCtrl parameters: {0}")]
    ParamLoadError(#[from] LoadError),

    #[error("Could not initialise the CarCtrl archives: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("Invalid frame layout: {0}")]
    LayoutError(#[from] ConfigError),
}
