//! Parameters structure for LongPlan

use serde::Deserialize;

use super::CruiseSolverParams;

/// Parameters for longitudinal planning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    pub cruise_solver: CruiseSolverParams,

    /// Fallback acceleration per unit of speed above the cruise speed.
    ///
    /// Units: 1/seconds
    pub fallback_k: f64,

    /// Strongest fallback deceleration, positive.
    ///
    /// Units: meters/second^2
    pub fallback_decel_mss: f64,

    /// Minimum time between solver reset warnings.
    ///
    /// Units: seconds
    pub fault_warn_period_s: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            cruise_solver: CruiseSolverParams::default(),
            fallback_k: 0.3,
            fallback_decel_mss: 1.0,
            fault_warn_period_s: 5.0,
        }
    }
}
