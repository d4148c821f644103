//! Acceleration shaping and dashboard codes

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::{ACCEL_HYST_GAP, ACCEL_MAX, ACCEL_MIN};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Codes shown on the dashboard through the steering message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HudState {
    /// Steering alert, 3 when the driver must take over
    pub hud_alert: u8,

    /// Which lane lines are drawn
    pub lane_visible: u8,

    pub left_lane_warning: u8,

    pub right_lane_warning: u8,
}

/// Inputs to `process_hud_alert`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HudInput {
    pub enabled: bool,
    pub steer_required: bool,
    pub left_line: bool,
    pub right_line: bool,
    pub left_lane_depart: bool,
    pub right_lane_depart: bool,

    /// The cluster uses the single-level departure warning
    pub single_level_warning: bool,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Hold the acceleration command steady through oscillations smaller than
/// the hysteresis gap.
///
/// Returns the command to use and the new steady value.
pub fn accel_hysteresis(accel: f64, accel_steady: f64) -> (f64, f64) {
    let steady = if accel > accel_steady + ACCEL_HYST_GAP {
        accel - ACCEL_HYST_GAP
    } else if accel < accel_steady - ACCEL_HYST_GAP {
        accel + ACCEL_HYST_GAP
    } else {
        accel_steady
    };

    (steady, steady)
}

/// Scale a normalised gas/brake command into an acceleration request.
///
/// Units: meters/second^2
pub fn scale_accel(accel_norm: f64) -> f64 {
    let scale = ACCEL_MAX.max(-ACCEL_MIN);
    clamp(accel_norm * scale, ACCEL_MIN, ACCEL_MAX)
}

/// Work out the dashboard codes for this cycle.
pub fn process_hud_alert(input: &HudInput) -> HudState {
    let hud_alert = if input.steer_required { 3 } else { 0 };

    let lane_visible = match (input.left_line, input.right_line) {
        (true, true) if input.enabled => 3,
        (true, true) => 4,
        (true, false) => 5,
        (false, true) => 6,
        (false, false) => 1,
    };

    let warning = |depart: bool| match (depart, input.single_level_warning) {
        (false, _) => 0,
        (true, true) => 1,
        (true, false) => 2,
    };

    HudState {
        hud_alert,
        lane_visible,
        left_lane_warning: warning(input.left_lane_depart),
        right_lane_warning: warning(input.right_lane_depart),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_accel_hysteresis() {
        let (a, s) = accel_hysteresis(0.01, 0.0);
        assert_eq!((a, s), (0.0, 0.0));

        let (a, s) = accel_hysteresis(0.5, 0.0);
        assert!((a - 0.48).abs() < 1e-12);
        assert_eq!(a, s);

        let (a, _) = accel_hysteresis(0.47, s);
        assert!((a - 0.48).abs() < 1e-12);

        let (a, _) = accel_hysteresis(-1.0, s);
        assert!((a + 0.98).abs() < 1e-12);
    }

    #[test]
    fn test_scale_accel() {
        assert_eq!(scale_accel(0.0), 0.0);
        assert_eq!(scale_accel(1.0), ACCEL_MAX);
        assert_eq!(scale_accel(-1.0), ACCEL_MIN);
        assert!((scale_accel(-0.5) + 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_hud_codes() {
        let mut input = HudInput {
            enabled: true,
            left_line: true,
            right_line: true,
            ..Default::default()
        };
        assert_eq!(process_hud_alert(&input).lane_visible, 3);

        input.enabled = false;
        assert_eq!(process_hud_alert(&input).lane_visible, 4);

        input.right_line = false;
        assert_eq!(process_hud_alert(&input).lane_visible, 5);

        input.left_line = false;
        input.right_line = true;
        assert_eq!(process_hud_alert(&input).lane_visible, 6);

        input.right_line = false;
        input.steer_required = true;
        input.left_lane_depart = true;
        let hud = process_hud_alert(&input);
        assert_eq!(hud.lane_visible, 1);
        assert_eq!(hud.hud_alert, 3);
        assert_eq!(hud.left_lane_warning, 2);
        assert_eq!(hud.right_lane_warning, 0);

        input.single_level_warning = true;
        assert_eq!(process_hud_alert(&input).left_lane_warning, 1);
    }
}
