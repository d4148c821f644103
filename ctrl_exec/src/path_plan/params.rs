//! Parameters structure for PathPlan

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{LaneChangeParams, LaneHug, PurePursuitParams, VehicleModel};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for path planning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    pub vehicle: VehicleModel,

    pub lane_change: LaneChangeParams,

    pub lane_hug: LaneHug,

    pub pure_pursuit: PurePursuitParams,

    /// Delay between a steering command and the wheels moving.
    ///
    /// Units: seconds
    pub steer_actuator_delay_s: f64,

    /// Offset of the measured steering angle from straight ahead.
    ///
    /// Units: degrees
    pub angle_offset_deg: f64,

    /// Solutions taking longer than this are discarded.
    ///
    /// Units: seconds
    pub solver_budget_s: f64,

    /// Minimum time between solver fault warnings.
    ///
    /// Units: seconds
    pub fault_warn_period_s: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            vehicle: VehicleModel::default(),
            lane_change: LaneChangeParams::default(),
            lane_hug: LaneHug::default(),
            pure_pursuit: PurePursuitParams::default(),
            steer_actuator_delay_s: 0.1,
            angle_offset_deg: 0.0,
            solver_budget_s: 0.04,
            fault_warn_period_s: 5.0,
        }
    }
}
