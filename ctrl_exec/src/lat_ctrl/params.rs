//! Parameters structure for LatCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use util::maths::Lookup;

use crate::pid::PiGains;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for lateral control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- ENGAGEMENT ----

    /// Below this speed the steering command is held at zero.
    ///
    /// Units: meters/second
    pub min_speed_ms: f64,

    // ---- PI CONTROLLER ----

    /// PI gains against speed
    pub gains: PiGains,

    /// Maximum normalised steering command against speed
    pub steer_max: Lookup,

    /// Rate at which `proc` is called
    ///
    /// Units: Hertz
    pub rate_hz: f64,

    /// Saturation counter threshold of the PI controller, between 0 and 1.
    pub sat_limit: f64,

    /// If true the actuator is torque controlled and the feed-forward is
    /// scaled by the square of the speed.
    pub torque_actuator: bool,

    // ---- SATURATION ----

    /// Saturation is only tracked above this speed.
    ///
    /// Units: meters/second
    pub sat_check_min_speed_ms: f64,

    /// Time the PI must stay saturated before the fault is raised.
    ///
    /// Units: seconds
    pub sat_dwell_s: f64,

    // ---- FILTERING ----

    /// Look-ahead applied to the measured rate when projecting the angle.
    ///
    /// Units: seconds
    pub rate_projection_s: f64,

    /// Length of the moving average applied to the projected angle.
    pub dampening_samples: f64,

    // ---- FEED-FORWARD ----

    /// Desired rate above which the rate dominated feed-forward is used.
    ///
    /// Units: degrees/second
    pub rate_ff_enter_degs: f64,

    /// Desired rate below which the angle dominated feed-forward returns.
    ///
    /// Units: degrees/second
    pub rate_ff_exit_degs: f64,

    /// Time over which the desired rate is integrated into the feed-forward
    /// in rate dominated mode.
    ///
    /// Units: seconds
    pub rate_ff_time_s: f64,

    // ---- DIAGNOSTICS ----

    /// Minimum time between invalid trajectory warnings.
    ///
    /// Units: seconds
    pub traj_warn_period_s: f64,

    /// Minimum time between non-finite value warnings.
    ///
    /// Units: seconds
    pub fault_warn_period_s: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            min_speed_ms: 0.3,
            gains: PiGains {
                k_p: Lookup::constant(0.25),
                k_i: Lookup::constant(0.05),
                k_f: 0.00005,
            },
            steer_max: Lookup::constant(1.0),
            rate_hz: 100.0,
            sat_limit: 0.8,
            torque_actuator: true,
            sat_check_min_speed_ms: 10.0,
            sat_dwell_s: 0.7,
            rate_projection_s: 0.5,
            dampening_samples: 50.0,
            rate_ff_enter_degs: 10.0,
            rate_ff_exit_degs: 5.0,
            rate_ff_time_s: 0.1,
            traj_warn_period_s: 5.0,
            fault_warn_period_s: 5.0,
        }
    }
}

impl Params {
    /// Name of the first lookup table which cannot be evaluated, if any.
    pub fn invalid_lookup(&self) -> Option<&'static str> {
        [
            ("k_p", &self.gains.k_p),
            ("k_i", &self.gains.k_i),
            ("steer_max", &self.steer_max),
        ]
        .iter()
        .find(|(_, l)| !l.is_valid())
        .map(|(name, _)| *name)
    }
}
