//! Longitudinal solver interface and a cruise/follow stand-in solver

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::solver::SolverError;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Input to one longitudinal solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongSolverInput {
    /// Units: meters/second
    pub v_ego_ms: f64,

    /// Units: meters/second^2
    pub a_ego_mss: f64,

    /// Lead position, speed and acceleration if one is tracked.
    pub lead: Option<(f64, f64, f64)>,

    /// Units: meters/second
    pub v_cruise_ms: f64,
}

/// Planned trajectory over the horizon, one entry per step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LongSolution {
    /// Units: meters
    pub x_ego: Vec<f64>,

    /// Units: meters/second
    pub v_ego: Vec<f64>,

    /// Units: meters/second^2
    pub a_ego: Vec<f64>,

    /// Units: meters
    pub x_lead: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CruiseSolverParams {
    /// Number of steps
    pub horizon: usize,

    /// Units: seconds
    pub step_s: f64,

    /// Acceleration per unit speed error.
    ///
    /// Units: 1/seconds
    pub k_speed: f64,

    /// Speed per unit of gap error when following.
    ///
    /// Units: 1/seconds
    pub k_gap: f64,

    /// Units: seconds
    pub time_gap_s: f64,

    /// Units: meters
    pub min_gap_m: f64,

    /// Units: meters/second^2
    pub a_min_mss: f64,

    /// Units: meters/second^2
    pub a_max_mss: f64,
}

/// Tracks the cruise speed, or a speed which holds a time gap to the lead,
/// with bounded acceleration.
///
/// This is a stand-in so the executable runs without a predictive solver.
#[derive(Debug, Clone)]
pub struct CruiseSolver {
    params: CruiseSolverParams,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A solver which plans speed over a horizon.
pub trait LongitudinalSolver {
    fn solve(&mut self, input: &LongSolverInput) -> Result<LongSolution, SolverError>;

    /// Drop any warm start state.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CruiseSolverParams {
    fn default() -> Self {
        Self {
            horizon: 20,
            step_s: 0.2,
            k_speed: 0.5,
            k_gap: 0.3,
            time_gap_s: 1.8,
            min_gap_m: 4.0,
            a_min_mss: -3.0,
            a_max_mss: 1.5,
        }
    }
}

impl CruiseSolver {
    pub fn new(params: CruiseSolverParams) -> Self {
        Self { params }
    }
}

impl LongitudinalSolver for CruiseSolver {
    fn solve(&mut self, input: &LongSolverInput) -> Result<LongSolution, SolverError> {
        let p = &self.params;
        if p.horizon < 2 || p.step_s <= 0.0 {
            return Err(SolverError::InvalidInput(format!(
                "horizon of {} steps of {} s", p.horizon, p.step_s
            )));
        }

        // Without a lead, plan against one far ahead and faster
        let (mut x_lead, v_lead, a_lead) = input
            .lead
            .unwrap_or((50.0, input.v_ego_ms + 10.0, 0.0));

        let mut sol = LongSolution {
            x_ego: Vec::with_capacity(p.horizon),
            v_ego: Vec::with_capacity(p.horizon),
            a_ego: Vec::with_capacity(p.horizon),
            x_lead: Vec::with_capacity(p.horizon),
        };

        let mut x = 0.0;
        let mut v = input.v_ego_ms;
        let mut a = input.a_ego_mss;
        let mut v_l = v_lead;

        for _ in 0..p.horizon {
            sol.x_ego.push(x);
            sol.v_ego.push(v);
            sol.a_ego.push(a);
            sol.x_lead.push(x_lead);

            let gap_err = (x_lead - x) - (p.min_gap_m + p.time_gap_s * v);
            let v_follow = v_l + p.k_gap * gap_err;
            let v_des = input.v_cruise_ms.min(v_follow).max(0.0);

            a = clamp(p.k_speed * (v_des - v), p.a_min_mss, p.a_max_mss);
            x += v * p.step_s + 0.5 * a * p.step_s.powi(2);
            v = (v + a * p.step_s).max(0.0);

            x_lead += v_l * p.step_s;
            v_l = (v_l + a_lead * p.step_s).max(0.0);
        }

        Ok(sol)
    }

    fn reset(&mut self) {}
}
