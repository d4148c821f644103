//! Steering torque limits
//!
//! The power steering faults if the requested torque moves too quickly or
//! fights the driver, so every command passes through these limits before it
//! is encoded.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Limits on the requested steering torque.
///
/// All torques are in actuator units.
#[derive(Debug, Clone, Deserialize)]
pub struct SteerLimitParams {
    /// Largest torque magnitude which may be requested
    pub steer_max: f64,

    /// Largest increase in magnitude per frame
    pub delta_up: f64,

    /// Largest decrease in magnitude per frame
    pub delta_down: f64,

    /// Driver torque tolerated before the limit starts shrinking
    pub driver_allowance: f64,

    pub driver_multiplier: f64,

    pub driver_factor: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SteerLimitParams {
    fn default() -> Self {
        Self {
            steer_max: 255.0,
            delta_up: 3.0,
            delta_down: 7.0,
            driver_allowance: 50.0,
            driver_multiplier: 2.0,
            driver_factor: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Limit a requested torque against the driver's torque and the previous
/// request.
///
/// The magnitude shrinks as the driver steers against the request, and may
/// only grow by `delta_up` or shrink by `delta_down` each frame. The result is
/// rounded to a whole actuator unit.
pub fn apply_std_steer_torque_limits(
    apply_torque: f64,
    apply_torque_last: f64,
    driver_torque: f64,
    limits: &SteerLimitParams,
) -> f64 {
    let driver_offset = driver_torque * limits.driver_factor;
    let driver_max = limits.steer_max
        + (limits.driver_allowance + driver_offset) * limits.driver_multiplier;
    let driver_min = -limits.steer_max
        + (-limits.driver_allowance + driver_offset) * limits.driver_multiplier;

    let max_allowed = limits.steer_max.min(driver_max).max(0.0);
    let min_allowed = (-limits.steer_max).max(driver_min).min(0.0);

    let torque = clamp(apply_torque, min_allowed, max_allowed);

    let torque = if apply_torque_last > 0.0 {
        clamp(
            torque,
            (apply_torque_last - limits.delta_down).max(-limits.delta_up),
            apply_torque_last + limits.delta_up,
        )
    } else {
        clamp(
            torque,
            apply_torque_last - limits.delta_up,
            (apply_torque_last + limits.delta_down).min(limits.delta_up),
        )
    };

    torque.round()
}
