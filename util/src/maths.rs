//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A piecewise-linear lookup table, typically keyed by vehicle speed.
///
/// Breakpoints must be in ascending order. Values outside the breakpoint
/// range are held at the first/last value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lookup {
    /// Breakpoints
    pub bp: Vec<f64>,

    /// Values at each breakpoint
    pub v: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Lookup {
    /// Create a new lookup from breakpoints and values.
    pub fn new(bp: Vec<f64>, v: Vec<f64>) -> Self {
        Self { bp, v }
    }

    /// A lookup which returns `value` everywhere.
    pub fn constant(value: f64) -> Self {
        Self {
            bp: vec![0.0],
            v: vec![value],
        }
    }

    /// Evaluate the table at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        interp(x, &self.bp, &self.v)
    }

    /// Returns true if the table has matching, non-empty, ascending
    /// breakpoints.
    pub fn is_valid(&self) -> bool {
        !self.bp.is_empty()
            && self.bp.len() == self.v.len()
            && self.bp.windows(2).all(|w| w[0] <= w[1])
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Linearly interpolate `x` into the table given by `xp` and `fp`.
///
/// `xp` must be ascending. Outside of the table the end values are returned.
/// An empty table gives zero.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());

    if n == 0 {
        return 0.0;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }

    // Find the first breakpoint above x, the one before it is the lower
    // bound of the segment.
    let hi = match xp[..n].iter().position(|&b| b > x) {
        Some(i) => i,
        None => return fp[n - 1],
    };
    let lo = hi - 1;

    let span = xp[hi] - xp[lo];
    if span <= 0.0 {
        return fp[hi];
    }

    lin_map((xp[lo], xp[hi]), (fp[lo], fp[hi]), x)
}

/// Apply polynomial coefficients to a value
///
/// Coefficients are ordered highest power first.
pub fn poly_val<T>(value: T, coeffs: &[T]) -> T
where
    T: Float
{
    coeffs.iter().fold(T::zero(), |acc, &c| acc * value + c)
}

/// Clamp a value between a minimum and maximum.
///
/// Unlike `f64::clamp` this does not panic if `min > max`, in that case `max`
/// wins.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret < min {
        ret = min
    }
    if ret > max {
        ret = max
    }

    ret
}

/// Subtract a symmetric deadzone from an error signal.
///
/// A NaN error is returned unchanged so the caller can detect it.
pub fn apply_deadzone(error: f64, deadzone: f64) -> f64 {
    if error.is_nan() {
        error
    } else if error > deadzone {
        error - deadzone
    } else if error < -deadzone {
        error + deadzone
    } else {
        0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_interp() {
        let xp = [0.0, 10.0, 20.0];
        let fp = [1.0, 2.0, 0.0];

        assert_eq!(interp(-5.0, &xp, &fp), 1.0);
        assert_eq!(interp(0.0, &xp, &fp), 1.0);
        assert_eq!(interp(5.0, &xp, &fp), 1.5);
        assert_eq!(interp(15.0, &xp, &fp), 1.0);
        assert_eq!(interp(20.0, &xp, &fp), 0.0);
        assert_eq!(interp(100.0, &xp, &fp), 0.0);
        assert_eq!(interp(3.0, &[], &[]), 0.0);
        assert_eq!(interp(3.0, &[1.0], &[7.0]), 7.0);
    }

    #[test]
    fn test_lookup() {
        let l = Lookup::new(vec![0.0, 35.0], vec![0.5, 1.0]);
        assert!(l.is_valid());
        assert_eq!(l.eval(17.5), 0.75);
        assert_eq!(Lookup::constant(0.3).eval(100.0), 0.3);

        assert!(!Lookup::new(vec![1.0, 0.0], vec![0.0, 1.0]).is_valid());
        assert!(!Lookup::new(vec![], vec![]).is_valid());
    }

    #[test]
    fn test_poly_val() {
        // 2x^2 + 3x + 1
        assert_eq!(poly_val(2.0, &[2.0, 3.0, 1.0]), 15.0);
        assert_eq!(poly_val(2.0, &[]), 0.0);
    }

    #[test]
    fn test_clamp_and_deadzone() {
        assert_eq!(clamp(5.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.5, -1.0, 1.0), 0.5);

        assert_eq!(apply_deadzone(0.05, 0.1), 0.0);
        assert!((apply_deadzone(0.3, 0.1) - 0.2).abs() < 1e-12);
        assert!((apply_deadzone(-0.3, 0.1) + 0.2).abs() < 1e-12);
        assert!(apply_deadzone(std::f64::NAN, 0.0).is_nan());
        assert!(apply_deadzone(std::f64::NAN, 0.1).is_nan());
    }
}
