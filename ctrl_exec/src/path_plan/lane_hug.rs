//! Lane hugging correction
//!
//! Some vehicles sit towards one side of the lane when following the
//! planned angle. The correction divides desired angles towards that side by
//! a factor which grows with the angle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::vehicle::LaneChangeDirection;
use util::maths::interp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LaneHug {
    /// Side the vehicle hugs, `None` to disable
    pub direction: LaneChangeDirection,

    /// Divisor applied at `angle_deg` and above
    pub modifier: f64,

    /// Units: degrees
    pub angle_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LaneHug {
    fn default() -> Self {
        Self {
            direction: LaneChangeDirection::None,
            modifier: 1.0,
            angle_deg: 10.0,
        }
    }
}

impl LaneHug {
    /// Correct a desired angle in degrees, positive left.
    pub fn apply(&self, angle_deg: f64) -> f64 {
        let towards_side = match self.direction {
            LaneChangeDirection::Left => angle_deg > 0.0,
            LaneChangeDirection::Right => angle_deg < 0.0,
            LaneChangeDirection::None => false,
        };

        if towards_side {
            angle_deg / interp(angle_deg.abs(), &[0.0, self.angle_deg], &[1.0, self.modifier])
        } else {
            angle_deg
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lane_hug() {
        let off = LaneHug::default();
        assert_eq!(off.apply(5.0), 5.0);

        let left = LaneHug {
            direction: LaneChangeDirection::Left,
            modifier: 2.0,
            angle_deg: 10.0,
        };
        assert_eq!(left.apply(20.0), 10.0);
        assert_eq!(left.apply(-20.0), -20.0);
        assert!((left.apply(5.0) - 5.0 / 1.5).abs() < 1e-12);

        let right = LaneHug {
            direction: LaneChangeDirection::Right,
            ..left
        };
        assert_eq!(right.apply(-20.0), -10.0);
        assert_eq!(right.apply(20.0), 20.0);
    }
}
