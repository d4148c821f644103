//! Parameters structure for LongCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use util::maths::{clamp, Lookup};

use crate::{pid::PiGains, vehicle::GasProfile};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for longitudinal control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- PI CONTROLLER ----

    /// PI gains against speed
    pub gains: PiGains,

    /// Rate at which `proc` is called
    ///
    /// Units: Hertz
    pub rate_hz: f64,

    /// Saturation counter threshold of the PI controller, between 0 and 1.
    pub sat_limit: f64,

    /// Pedal demand per unit of acceleration, applied to the PI output.
    ///
    /// Units: 1/(meters/second^2)
    pub gb_per_accel: f64,

    /// Speed error deadzone against speed.
    ///
    /// Units: meters/second
    pub deadzone: Lookup,

    // ---- LIMITS ----

    /// Maximum gas demand against speed for each profile, between 0 and 1.
    pub gas_max: GasMaxProfiles,

    /// Number of cycles a lead is remembered after it is last seen.
    pub lead_hold_cycles: u32,

    /// Below this speed a lead scales the normal gas limit, above it the
    /// limit is offset.
    ///
    /// Units: meters/second
    pub lead_low_speed_ms: f64,

    /// Fraction of the normal gas limit added against the lead's relative
    /// speed at low speed.
    pub lead_gas_scale: Lookup,

    /// Offset added to the normal gas limit against the lead's relative
    /// speed.
    pub lead_gas_offset: Lookup,

    /// Maximum brake demand against speed, between 0 and 1.
    pub brake_max: Lookup,

    // ---- BEHAVIOUR ----

    /// The vehicle controls its own stopping, so overshoot prevention is not
    /// needed.
    pub stopping_control: bool,

    /// Tracking is only entered at or above this speed.
    ///
    /// Units: meters/second
    pub min_engage_speed_ms: f64,

    /// Number of cycles full braking is held after a forward collision
    /// warning.
    pub fcw_countdown_cycles: u32,

    /// Minimum time between numeric fault warnings.
    ///
    /// Units: seconds
    pub fault_warn_period_s: f64,
}

/// Gas limit tables for each driver profile.
#[derive(Debug, Clone, Deserialize)]
pub struct GasMaxProfiles {
    pub normal: Lookup,
    pub sport: Lookup,
    pub eco: Lookup,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            gains: PiGains {
                k_p: Lookup::new(vec![0.0, 5.0, 35.0], vec![1.2, 0.8, 0.5]),
                k_i: Lookup::new(vec![0.0, 35.0], vec![0.18, 0.12]),
                k_f: 1.0,
            },
            rate_hz: 100.0,
            sat_limit: 0.8,
            gb_per_accel: 1.0 / 3.0,
            deadzone: Lookup::constant(0.0),
            gas_max: GasMaxProfiles {
                normal: Lookup::new(
                    vec![
                        0.0, 1.4082, 2.80311, 4.22661, 5.38271, 6.16561, 7.24781, 8.28308,
                        10.24465, 12.96402, 15.42303, 18.11903, 20.11703, 24.46614,
                        29.05805, 32.71015, 35.76326,
                    ],
                    vec![
                        0.35, 0.47, 0.43, 0.35, 0.3, 0.3, 0.3229, 0.34784, 0.36765, 0.38,
                        0.396, 0.409, 0.425, 0.478, 0.55, 0.621, 0.7,
                    ],
                ),
                sport: Lookup::new(vec![0.0, 9.0, 35.0], vec![0.9, 0.95, 0.99]),
                eco: Lookup::new(vec![0.0, 9.0, 35.0], vec![0.25, 0.2, 0.2]),
            },
            lead_hold_cycles: 10,
            lead_low_speed_ms: 6.7056,
            lead_gas_scale: Lookup::new(
                vec![1.61479, 1.99067, 2.28537, 2.49888, 2.6312, 2.68224],
                vec![-1.0, -0.9434, -0.8333, -0.5556, -0.2273, 0.0],
            ),
            lead_gas_offset: Lookup::new(
                vec![-0.89408, 0.0, 0.89408, 4.4704],
                vec![-0.15, -0.05, 0.005, 0.05],
            ),
            brake_max: Lookup::new(vec![0.0], vec![1.0]),
            stopping_control: true,
            min_engage_speed_ms: 0.0,
            fcw_countdown_cycles: 200,
            fault_warn_period_s: 5.0,
        }
    }
}

impl Params {
    /// Maximum gas demand for the profile at `v_ego_ms`.
    ///
    /// `lead_v_rel_ms` is the relative speed of a recently seen lead, which
    /// only adjusts the normal profile. The result is between 0 and 1.
    pub fn gas_max(&self, profile: GasProfile, v_ego_ms: f64, lead_v_rel_ms: Option<f64>)
        -> f64
    {
        let mut gas_max = match profile {
            GasProfile::Normal => self.gas_max.normal.eval(v_ego_ms),
            GasProfile::Sport => self.gas_max.sport.eval(v_ego_ms),
            GasProfile::Eco => self.gas_max.eco.eval(v_ego_ms),
        };

        if let (GasProfile::Normal, Some(v_rel)) = (profile, lead_v_rel_ms) {
            if v_ego_ms < self.lead_low_speed_ms {
                gas_max += gas_max * self.lead_gas_scale.eval(v_rel);
            }
            else {
                gas_max += self.lead_gas_offset.eval(v_rel);
            }
        }

        clamp(gas_max, 0.0, 1.0)
    }

    /// Name of the first lookup table which cannot be evaluated, if any.
    pub fn invalid_lookup(&self) -> Option<&'static str> {
        [
            ("k_p", &self.gains.k_p),
            ("k_i", &self.gains.k_i),
            ("deadzone", &self.deadzone),
            ("gas_max.normal", &self.gas_max.normal),
            ("gas_max.sport", &self.gas_max.sport),
            ("gas_max.eco", &self.gas_max.eco),
            ("lead_gas_scale", &self.lead_gas_scale),
            ("lead_gas_offset", &self.lead_gas_offset),
            ("brake_max", &self.brake_max),
        ]
        .iter()
        .find(|(_, l)| !l.is_valid())
        .map(|(name, _)| *name)
    }
}
