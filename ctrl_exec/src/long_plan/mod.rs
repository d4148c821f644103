//! Longitudinal planning module
//!
//! Runs the longitudinal solver, checks its solution is physically sensible
//! and produces the speed and acceleration targets for longitudinal control.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod solver;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use solver::*;
pub use state::*;

use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Solution index used as the current target.
pub const TARGET_STEP: usize = 1;

/// Solution index used as the future target.
pub const FUTURE_STEP: usize = 10;

/// A lead closer than this behind the planned ego position means the plan
/// drives through it.
///
/// Units: meters
pub const CRASHING_GAP_M: f64 = -50.0;

/// Planned speeds below this mean the plan reverses.
///
/// Units: meters/second
pub const BACKWARDS_SPEED_MS: f64 = -0.01;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during LongPlan operation.
#[derive(Debug, thiserror::Error)]
pub enum LongPlanError {
    #[error("Could not load the LongPlan parameters: {0}")]
    ParamLoadError(#[from] LoadError),

    #[error("Could not initialise the LongPlan archives: {0}")]
    ArchiveError(#[from] ArchiveError),
}
