//! Path planning module
//!
//! Arbitrates lane changes, blends the lane lines into a driving path, runs
//! the lateral solver and emits the desired steering angle trajectory for
//! lateral control.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod lane_change;
mod lane_hug;
mod lanes;
mod params;
mod solver;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use lane_change::*;
pub use lane_hug::*;
pub use lanes::*;
pub use params::*;
pub use solver::*;
pub use state::*;

use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period of the planning cycle.
///
/// Units: seconds
pub const DT_PLAN_S: f64 = 0.05;

/// Solutions costing more than this are counted as invalid.
pub const MAX_SOLUTION_COST: f64 = 20000.0;

/// Speed given to the solver is floored to this value.
///
/// Units: meters/second
pub const MIN_SOLVER_SPEED_MS: f64 = 5.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during PathPlan operation.
#[derive(Debug, thiserror::Error)]
pub enum PathPlanError {
    #[error("Could not load the PathPlan parameters: {0}")]
    ParamLoadError(#[from] LoadError),

    #[error("Could not initialise the PathPlan archives: {0}")]
    ArchiveError(#[from] ArchiveError),
}
