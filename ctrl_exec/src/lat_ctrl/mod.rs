//! Lateral control module
//!
//! Turns the desired steering angle trajectory from path planning into a
//! normalised steering command, blending the angle feed-forward with PI
//! feedback on the measured angle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod saturation;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use saturation::*;
pub use state::*;

use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during LatCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum LatCtrlError {
    #[error("Could not load the LatCtrl parameters: {0}")]
    ParamLoadError(#[from] LoadError),

    #[error("Could not initialise the LatCtrl archives: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("The LatCtrl {0} lookup table is empty, mismatched or unsorted")]
    InvalidLookup(&'static str),
}
