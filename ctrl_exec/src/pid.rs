//! # PI controller
//!
//! A proportional-integral controller with speed scheduled gains, a
//! feed-forward term, output limits and anti-windup. Both the lateral and
//! longitudinal controllers are built on it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use util::maths::{apply_deadzone, clamp, Lookup};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains of a PI controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiGains {
    /// Proportional gain against speed
    pub k_p: Lookup,

    /// Integral gain against speed
    pub k_i: Lookup,

    /// Feed-forward gain
    pub k_f: f64,
}

/// Inputs to one controller update.
#[derive(Debug, Clone, Copy, Default)]
pub struct PiInput {
    pub setpoint: f64,
    pub measurement: f64,

    /// Speed used to schedule the gains.
    pub speed: f64,

    /// Track saturation on this update
    pub check_saturation: bool,

    /// The driver is overriding, unwind the integrator.
    pub override_active: bool,

    pub feedforward: f64,

    /// Error deadzone
    pub deadzone: f64,

    /// Hold the integrator at its current value
    pub freeze_integrator: bool,
}

/// A PI controller.
#[derive(Debug, Clone, Serialize)]
pub struct PiController {
    #[serde(skip)]
    gains: PiGains,

    pos_limit: f64,
    neg_limit: f64,

    /// Integrator gain per update
    i_rate: f64,

    /// Integrator unwind per update while overriding
    i_unwind_rate: f64,

    /// Saturation counter change per update
    sat_count_rate: f64,

    /// Saturation counter threshold
    sat_limit: f64,

    /// Multiplier applied to the raw control before limiting
    output_scale: f64,

    p: f64,
    i: f64,
    f: f64,
    sat_count: f64,
    saturated: bool,
    control: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PiController {
    /// Create a new controller updated at `rate_hz`, reporting saturation once
    /// the saturation counter passes `sat_limit`.
    ///
    /// Limits start at +/-1.
    pub fn new(gains: PiGains, rate_hz: f64, sat_limit: f64) -> Self {
        Self {
            gains,
            pos_limit: 1.0,
            neg_limit: -1.0,
            i_rate: 1.0 / rate_hz,
            i_unwind_rate: 0.3 / rate_hz,
            sat_count_rate: 1.0 / rate_hz,
            sat_limit,
            output_scale: 1.0,
            p: 0.0,
            i: 0.0,
            f: 0.0,
            sat_count: 0.0,
            saturated: false,
            control: 0.0,
        }
    }

    /// Scale the raw control (P + I + F) before it is limited, for example to
    /// convert an acceleration into a pedal demand.
    pub fn with_output_scale(mut self, scale: f64) -> Self {
        self.output_scale = scale;
        self
    }

    /// Set the output limits.
    pub fn set_limits(&mut self, neg_limit: f64, pos_limit: f64) {
        self.neg_limit = neg_limit;
        self.pos_limit = pos_limit;
    }

    /// Clear all internal state.
    pub fn reset(&mut self) {
        self.p = 0.0;
        self.i = 0.0;
        self.f = 0.0;
        self.sat_count = 0.0;
        self.saturated = false;
        self.control = 0.0;
    }

    /// Zero the integrator only.
    pub fn reset_integrator(&mut self) {
        self.i = 0.0;
    }

    /// Run one update, returning the limited control.
    pub fn update(&mut self, input: &PiInput) -> f64 {
        let error = apply_deadzone(input.setpoint - input.measurement, input.deadzone);
        let k_p = self.gains.k_p.eval(input.speed);
        let k_i = self.gains.k_i.eval(input.speed);

        self.p = error * k_p;
        self.f = input.feedforward * self.gains.k_f;

        if input.override_active {
            self.i -= self.i_unwind_rate * signum(self.i);
        } else {
            let i = self.i + error * k_i * self.i_rate;
            let control = (self.p + self.f + i) * self.output_scale;

            // Only integrate when doing so moves the control away from the
            // limits, or the integrator is moving towards the sign of the
            // error.
            let may_integrate = (error >= 0.0 && (control <= self.pos_limit || i < 0.0))
                || (error <= 0.0 && (control >= self.neg_limit || i > 0.0));

            if may_integrate && !input.freeze_integrator {
                self.i = i;
            }
        }

        let control = (self.p + self.i + self.f) * self.output_scale;

        self.saturated = if input.check_saturation {
            self.check_saturation(control, input.override_active, error)
        } else {
            false
        };

        self.control = clamp(control, self.neg_limit, self.pos_limit);
        self.control
    }

    fn check_saturation(&mut self, control: f64, override_active: bool, error: f64) -> bool {
        let saturated = control < self.neg_limit || control > self.pos_limit;

        if saturated && !override_active && error.abs() > 0.1 {
            self.sat_count += self.sat_count_rate;
        } else {
            self.sat_count -= self.sat_count_rate;
        }

        self.sat_count = clamp(self.sat_count, 0.0, 1.0);

        self.sat_count > self.sat_limit
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn i(&self) -> f64 {
        self.i
    }

    pub fn f(&self) -> f64 {
        self.f
    }

    /// Saturation as of the last update
    pub fn saturated(&self) -> bool {
        self.saturated
    }

    pub fn control(&self) -> f64 {
        self.control
    }
}

/// Sign of a value, zero for zero.
fn signum(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn gains(k_p: f64, k_i: f64) -> PiGains {
        PiGains {
            k_p: Lookup::constant(k_p),
            k_i: Lookup::constant(k_i),
            k_f: 1.0,
        }
    }

    #[test]
    fn test_pi_limits_and_windup() {
        let mut pi = PiController::new(gains(1.0, 10.0), 100.0, 0.8);
        pi.set_limits(-0.5, 0.5);

        let input = PiInput {
            setpoint: 10.0,
            check_saturation: true,
            ..Default::default()
        };

        for _ in 0..200 {
            assert_eq!(pi.update(&input), 0.5);
        }

        // P alone is beyond the limit so the integrator never grows
        assert_eq!(pi.i(), 0.0);
        assert!(pi.saturated());
    }

    #[test]
    fn test_pi_freeze_and_unwind() {
        let mut pi = PiController::new(gains(0.0, 1.0), 100.0, 0.8);
        pi.set_limits(-10.0, 10.0);

        let mut input = PiInput {
            setpoint: 1.0,
            ..Default::default()
        };
        pi.update(&input);
        assert!((pi.i() - 0.01).abs() < 1e-12);

        input.freeze_integrator = true;
        pi.update(&input);
        assert!((pi.i() - 0.01).abs() < 1e-12);

        input.freeze_integrator = false;
        input.override_active = true;
        pi.update(&input);
        assert!((pi.i() - 0.007).abs() < 1e-12);

        pi.reset();
        assert_eq!(pi.i(), 0.0);
        assert_eq!(pi.control(), 0.0);
    }

    #[test]
    fn test_pi_sat_counter() {
        let mut pi = PiController::new(gains(1.0, 0.0), 100.0, 0.8);
        pi.set_limits(-1.0, 1.0);

        let input = PiInput {
            setpoint: 5.0,
            check_saturation: true,
            ..Default::default()
        };

        // The counter must pass 0.8 before saturation is reported
        for _ in 0..79 {
            pi.update(&input);
            assert!(!pi.saturated());
        }
        for _ in 0..3 {
            pi.update(&input);
        }
        assert!(pi.saturated());
    }
}
