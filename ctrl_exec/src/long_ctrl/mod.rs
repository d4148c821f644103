//! Longitudinal control module
//!
//! A four state machine (off, tracking, stopping, starting) around a PI speed
//! controller, producing mutually exclusive gas and brake demands.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;
mod state_trans;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;
pub use state_trans::*;

use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Below this speed the vehicle may be brought to a stop.
///
/// Units: meters/second
pub const STOPPING_EGO_SPEED_MS: f64 = 0.5;

/// Lowest speed reported on the bus, anything below reads as zero.
///
/// Units: meters/second
pub const MIN_CAN_SPEED_MS: f64 = 0.3;

/// Units: meters/second
pub const STOPPING_TARGET_SPEED_MS: f64 = MIN_CAN_SPEED_MS + 0.01;

/// Units: meters/second
pub const STARTING_TARGET_SPEED_MS: f64 = 0.5;

/// Output above which starting hands over to the PI controller.
pub const BRAKE_THRESHOLD_TO_PID: f64 = 0.2;

/// Brake travel per second while stopping.
pub const STOPPING_BRAKE_RATE: f64 = 0.2;

/// Brake release per second while starting.
pub const STARTING_BRAKE_RATE: f64 = 0.8;

/// Minimum brake held once stopped.
pub const BRAKE_STOPPING_TARGET: f64 = 0.5;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during LongCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum LongCtrlError {
    #[error("Could not load the LongCtrl parameters: {0}")]
    ParamLoadError(#[from] LoadError),

    #[error("Could not initialise the LongCtrl archives: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("The LongCtrl {0} lookup table is empty, mismatched or unsorted")]
    InvalidLookup(&'static str),
}
