//! Lane path blending and vehicle model

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::vehicle::LanePerception;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Widest lane the path is offset for.
///
/// Units: meters
const MAX_LANE_WIDTH_M: f64 = 4.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Lane lines and the blended driving path for one planning cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LanePath {
    pub l_poly: [f64; 4],
    pub r_poly: [f64; 4],

    /// Path to drive, highest power first
    pub d_poly: [f64; 4],

    pub l_prob: f64,
    pub r_prob: f64,

    /// Units: meters
    pub lane_width_m: f64,
}

/// Bicycle model parameters of the vehicle.
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleModel {
    /// Units: meters
    pub wheelbase_m: f64,

    /// Steering wheel angle per road wheel angle
    pub steer_ratio: f64,

    /// Understeer coefficient.
    ///
    /// Units: seconds^2/meters^2
    pub slip_factor: f64,
}

/// Start state handed to the lateral solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SolverState {
    /// Units: meters
    pub x: f64,

    /// Units: meters
    pub y: f64,

    /// Heading.
    ///
    /// Units: radians
    pub psi: f64,

    /// Road wheel angle.
    ///
    /// Units: radians
    pub delta: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LanePath {
    /// Build the path from the perceived lanes.
    ///
    /// During a lane change the lane lines are ignored (`zero_lanes`) and the
    /// path follows the model prediction.
    pub fn from_perception(lanes: &LanePerception, zero_lanes: bool) -> Self {
        let (l_prob, r_prob) = if zero_lanes {
            (0.0, 0.0)
        } else {
            (lanes.l_prob, lanes.r_prob)
        };

        let mut path = Self {
            l_poly: lanes.l_poly,
            r_poly: lanes.r_poly,
            d_poly: lanes.p_poly,
            l_prob,
            r_prob,
            lane_width_m: lanes.lane_width_m,
        };
        path.d_poly = path.blend(&lanes.p_poly);
        path
    }

    /// Weight the centre line implied by each lane line against the model's
    /// own path.
    fn blend(&self, p_poly: &[f64; 4]) -> [f64; 4] {
        let half_width = self.lane_width_m.min(MAX_LANE_WIDTH_M) / 2.0;

        let mut path_from_left = self.l_poly;
        path_from_left[3] -= half_width;
        let mut path_from_right = self.r_poly;
        path_from_right[3] += half_width;

        let lr_prob = self.l_prob * self.r_prob;
        let norm = self.l_prob + self.r_prob + 0.0001;

        let mut d_poly = [0.0; 4];
        for k in 0..4 {
            let d_lane = (self.l_prob * path_from_left[k] + self.r_prob * path_from_right[k]) / norm;
            d_poly[k] = lr_prob * d_lane + (1.0 - lr_prob) * p_poly[k];
        }

        d_poly
    }
}

impl Default for VehicleModel {
    fn default() -> Self {
        Self {
            wheelbase_m: 2.8,
            steer_ratio: 13.73,
            slip_factor: 0.0,
        }
    }
}

impl VehicleModel {
    /// Path curvature per unit of road wheel angle at speed `v_ms`.
    ///
    /// Units: 1/meters
    pub fn curvature_factor(&self, v_ms: f64) -> f64 {
        1.0 / (1.0 - self.slip_factor * v_ms.powi(2)) / self.wheelbase_m
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Move the solver start state forward by the steering actuator delay.
pub fn calc_states_after_delay(
    state: &mut SolverState,
    v_ego_ms: f64,
    steer_angle_deg: f64,
    curvature_factor: f64,
    steer_ratio: f64,
    delay_s: f64,
) {
    state.x = v_ego_ms * delay_s;
    state.psi = v_ego_ms * curvature_factor * steer_angle_deg.to_radians() / steer_ratio * delay_s;
}
