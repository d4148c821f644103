//! # Vehicle data model
//!
//! Snapshots of the vehicle and its surroundings as seen by the controllers,
//! plus the targets handed from the planners to the controllers. All of these
//! are plain data, immutable for the duration of a cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use util::maths::interp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State of one turn signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkerState {
    /// Stalk latched on
    pub on: bool,

    /// Stalk held for a momentary flash
    pub flash: bool,
}

/// Snapshot of the vehicle for one cycle.
///
/// Every field defaults so drive scripts only need to give what they change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleState {
    /// Units: meters/second
    pub v_ego_ms: f64,

    /// Units: meters/second^2
    pub a_ego_mss: f64,

    /// Measured steering wheel angle, positive left.
    ///
    /// Units: degrees
    pub steer_angle_deg: f64,

    /// Units: degrees/second
    pub steer_rate_degs: f64,

    /// Torque the driver applies to the wheel, positive left.
    ///
    /// Units: actuator torque units
    pub steer_torque_driver: f64,

    /// The driver is overriding the steering
    pub steer_pressed: bool,

    pub left_blinker: BlinkerState,

    pub right_blinker: BlinkerState,

    pub brake_pressed: bool,

    pub gas_pressed: bool,

    pub standstill: bool,

    /// Cruise control is holding the vehicle stationary
    pub cruise_standstill: bool,
}

/// The lead vehicle as reported by the radar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadState {
    /// Distance to the lead.
    ///
    /// Units: meters
    pub x_rel_m: f64,

    /// Units: meters/second
    pub v_lead_ms: f64,

    /// Units: meters/second^2
    pub a_lead_mss: f64,
}

/// Lane lines and path from the perception model.
///
/// Polynomials give lateral offset (left positive) against distance ahead,
/// highest power first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanePerception {
    pub l_poly: [f64; 4],
    pub r_poly: [f64; 4],

    /// Path predicted directly by the model
    pub p_poly: [f64; 4],

    /// Probability each line is present
    pub l_prob: f64,
    pub r_prob: f64,

    /// Probability a lane change to each side is under way
    pub l_lane_change_prob: f64,
    pub r_lane_change_prob: f64,

    /// Units: meters
    pub lane_width_m: f64,
}

/// A raw frame observed on the bus, normally sent by the stock camera or
/// power steering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockFrame {
    pub id: u32,
    pub data: Vec<u8>,
}

/// Everything the executable receives from outside the control core in one
/// cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveInput {
    /// Driver has engaged the system
    pub enabled: bool,

    pub vehicle: VehicleState,

    pub lead: Option<LeadState>,

    pub lanes: LanePerception,

    /// Cruise set speed.
    ///
    /// Units: meters/second
    pub v_cruise_ms: f64,

    /// Acceleration profile selected on the dash button
    pub gas_profile: GasProfile,

    /// Forward collision warning raised
    pub fcw: bool,

    /// Cancel stock cruise control
    pub cruise_cancel: bool,

    /// Driver must take over the steering
    pub steer_required: bool,

    pub left_lane_depart: bool,

    pub right_lane_depart: bool,

    /// Stock frames received since the last cycle
    pub stock_frames: Vec<StockFrame>,
}

/// Desired steering angle samples over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleTrajectory {
    /// `(time_s, angle_deg)` pairs, in ascending time
    pub samples: Vec<(f64, f64)>,
}

/// Targets for the controllers produced by the planners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlTarget {
    /// Units: meters/second
    pub v_target_ms: f64,

    /// Speed target at the end of the planning horizon.
    ///
    /// Units: meters/second
    pub v_target_future_ms: f64,

    /// Units: meters/second^2
    pub a_target_mss: f64,

    pub angle_traj: AngleTrajectory,

    /// Units: degrees/second
    pub rate_des_degs: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Side a lane change moves towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneChangeDirection {
    None,
    Left,
    Right,
}

/// Acceleration profile chosen by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasProfile {
    /// Speed dependent limit, adjusted for the lead
    Normal,
    Sport,
    Eco,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for GasProfile {
    fn default() -> Self {
        GasProfile::Normal
    }
}

impl Default for LaneChangeDirection {
    fn default() -> Self {
        LaneChangeDirection::None
    }
}

impl BlinkerState {
    /// Returns true if the blinker is signalling in either mode.
    pub fn is_active(&self) -> bool {
        self.on || self.flash
    }
}

impl VehicleState {
    /// Exactly one blinker is signalling.
    pub fn one_blinker(&self) -> bool {
        self.left_blinker.is_active() != self.right_blinker.is_active()
    }

    /// Direction indicated by the blinkers, left taking precedence.
    pub fn blinker_direction(&self) -> LaneChangeDirection {
        if self.left_blinker.is_active() {
            LaneChangeDirection::Left
        } else if self.right_blinker.is_active() {
            LaneChangeDirection::Right
        } else {
            LaneChangeDirection::None
        }
    }
}

impl Default for LanePerception {
    fn default() -> Self {
        Self {
            l_poly: [0.0, 0.0, 0.0, 1.8],
            r_poly: [0.0, 0.0, 0.0, -1.8],
            p_poly: [0.0; 4],
            l_prob: 0.0,
            r_prob: 0.0,
            l_lane_change_prob: 0.0,
            r_lane_change_prob: 0.0,
            lane_width_m: 3.7,
        }
    }
}

impl LanePerception {
    /// Combined probability that a lane change is under way.
    pub fn lane_change_prob(&self) -> f64 {
        self.l_lane_change_prob + self.r_lane_change_prob
    }
}

impl AngleTrajectory {
    pub fn new(samples: Vec<(f64, f64)>) -> Self {
        Self { samples }
    }

    /// Interpolate the angle at `time_s` using only finite samples.
    ///
    /// Returns the angle and the number of samples dropped as non-finite, or
    /// `None` if no usable sample remains. Outside the sampled range the
    /// nearest sample is held.
    pub fn angle_at(&self, time_s: f64) -> (Option<f64>, usize) {
        let (ts, angles): (Vec<f64>, Vec<f64>) = self
            .samples
            .iter()
            .filter(|(t, a)| t.is_finite() && a.is_finite())
            .copied()
            .unzip();

        let dropped = self.samples.len() - ts.len();

        if ts.is_empty() {
            (None, dropped)
        } else {
            (Some(interp(time_s, &ts, &angles)), dropped)
        }
    }
}
