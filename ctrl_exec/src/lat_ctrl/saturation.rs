//! Steering saturation monitor and feed-forward mode selection

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Raises a fault once the steering has been saturated continuously for
/// longer than a dwell time.
#[derive(Debug, Clone, Default)]
pub struct SaturationMonitor {
    dwell_s: f64,
    start_time_s: Option<f64>,
    flag: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which term dominates the lateral feed-forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedForwardMode {
    AngleDominant,
    RateDominant,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SaturationMonitor {
    pub fn new(dwell_s: f64) -> Self {
        Self {
            dwell_s,
            start_time_s: None,
            flag: false,
        }
    }

    /// Update with this cycle's saturation and return the fault flag.
    pub fn update(&mut self, saturated: bool, time_s: f64) -> bool {
        if saturated {
            let start = *self.start_time_s.get_or_insert(time_s);
            self.flag = time_s - start > self.dwell_s;
        } else {
            self.start_time_s = None;
            self.flag = false;
        }

        self.flag
    }

    pub fn is_saturated(&self) -> bool {
        self.flag
    }

    pub fn reset(&mut self) {
        self.start_time_s = None;
        self.flag = false;
    }
}

impl Default for FeedForwardMode {
    fn default() -> Self {
        FeedForwardMode::AngleDominant
    }
}

impl FeedForwardMode {
    /// Next mode given the desired rate, if one was supplied.
    ///
    /// At most one transition is made per call.
    pub fn next(self, rate_des_degs: Option<f64>, enter_degs: f64, exit_degs: f64) -> Self {
        match (self, rate_des_degs) {
            (FeedForwardMode::AngleDominant, Some(r)) if r.abs() > enter_degs => {
                FeedForwardMode::RateDominant
            }
            (FeedForwardMode::RateDominant, None) => FeedForwardMode::AngleDominant,
            (FeedForwardMode::RateDominant, Some(r)) if r.abs() < exit_degs => {
                FeedForwardMode::AngleDominant
            }
            (mode, _) => mode,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_saturation_dwell() {
        let mut mon = SaturationMonitor::new(0.7);

        // 70 consecutive saturated cycles at 100 Hz are not enough
        for k in 0..70 {
            assert!(!mon.update(true, k as f64 * 0.01), "flag raised at cycle {}", k);
        }

        let mut raised = false;
        for k in 70..76 {
            raised = mon.update(true, k as f64 * 0.01);
        }
        assert!(raised);

        // A single unsaturated cycle clears the flag and the timer
        assert!(!mon.update(false, 0.76));
        assert!(!mon.update(true, 0.77));
        assert!(!mon.is_saturated());
    }

    #[test]
    fn test_ff_mode() {
        use FeedForwardMode::*;

        assert_eq!(AngleDominant.next(None, 10.0, 5.0), AngleDominant);
        assert_eq!(AngleDominant.next(Some(8.0), 10.0, 5.0), AngleDominant);
        assert_eq!(AngleDominant.next(Some(-12.0), 10.0, 5.0), RateDominant);

        // Hysteresis between the thresholds
        assert_eq!(RateDominant.next(Some(7.0), 10.0, 5.0), RateDominant);
        assert_eq!(RateDominant.next(Some(4.0), 10.0, 5.0), AngleDominant);
        assert_eq!(RateDominant.next(None, 10.0, 5.0), AngleDominant);
    }
}
