//! Lateral solver interface and a geometric stand-in solver

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{LanePath, SolverState};
use crate::solver::SolverError;
use util::maths::{clamp, poly_val};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything a lateral solver is given for one planning cycle.
#[derive(Debug, Clone, Copy)]
pub struct LatSolverInput {
    pub state: SolverState,

    pub path: LanePath,

    /// Units: 1/meters
    pub curvature_factor: f64,

    /// Units: meters/second
    pub v_ego_ms: f64,

    /// Multiplier on the path tracking cost, reduced during lane changes.
    pub path_cost_scale: f64,
}

/// Solution over the solver horizon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatSolution {
    /// Road wheel angle at each step, the first entry is the start state.
    ///
    /// Units: radians
    pub delta: Vec<f64>,

    /// Road wheel angle rate at each step.
    ///
    /// Units: radians/second
    pub rate: Vec<f64>,

    pub cost: f64,
}

/// Parameters of the pure pursuit solver.
#[derive(Debug, Clone, Deserialize)]
pub struct PurePursuitParams {
    /// Look-ahead distance per unit speed.
    ///
    /// Units: seconds
    pub lookahead_time_s: f64,

    /// Units: meters
    pub min_lookahead_m: f64,

    /// Largest road wheel angle commanded.
    ///
    /// Units: radians
    pub max_delta_rad: f64,

    /// Number of solution steps
    pub horizon: usize,

    /// Units: seconds
    pub step_s: f64,

    /// Weight of the squared lateral error in the reported cost
    pub path_cost: f64,
}

/// Steers towards a point on the planned path a fixed time ahead.
///
/// This is not a predictive controller, it only exists so the executable can
/// run without one.
#[derive(Debug, Clone)]
pub struct PurePursuitSolver {
    params: PurePursuitParams,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A solver which plans the road wheel angle along the path.
pub trait LateralSolver {
    fn solve(&mut self, input: &LatSolverInput) -> Result<LatSolution, SolverError>;

    /// Drop any warm start state.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PurePursuitParams {
    fn default() -> Self {
        Self {
            lookahead_time_s: 1.5,
            min_lookahead_m: 8.0,
            max_delta_rad: 0.5,
            horizon: 20,
            step_s: 0.05,
            path_cost: 1.0,
        }
    }
}

impl PurePursuitSolver {
    pub fn new(params: PurePursuitParams) -> Self {
        Self { params }
    }
}

impl LateralSolver for PurePursuitSolver {
    fn solve(&mut self, input: &LatSolverInput) -> Result<LatSolution, SolverError> {
        if self.params.horizon < 2 {
            return Err(SolverError::InvalidInput(format!(
                "horizon of {} steps", self.params.horizon
            )));
        }
        if input.curvature_factor == 0.0 {
            return Err(SolverError::Infeasible);
        }

        let lookahead = (input.v_ego_ms * self.params.lookahead_time_s)
            .max(self.params.min_lookahead_m);

        // Lateral offset of the target point in the vehicle frame, allowing
        // for the heading already built up over the actuator delay
        let y = poly_val(lookahead + input.state.x, &input.path.d_poly)
            - input.state.y
            - lookahead * input.state.psi.tan();

        let curvature = 2.0 * y / lookahead.powi(2);
        let delta_target = clamp(
            curvature / input.curvature_factor,
            -self.params.max_delta_rad,
            self.params.max_delta_rad,
        );

        let n = self.params.horizon;
        let mut delta = Vec::with_capacity(n);
        let mut rate = Vec::with_capacity(n);

        // Move from the start angle to the target over the first step
        delta.push(input.state.delta);
        for _ in 1..n {
            delta.push(delta_target);
        }
        rate.push((delta_target - input.state.delta) / self.params.step_s);
        for _ in 1..n {
            rate.push(0.0);
        }

        Ok(LatSolution {
            delta,
            rate,
            cost: self.params.path_cost * input.path_cost_scale * y.powi(2),
        })
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod test {
    use super::*;

    fn input(offset_m: f64) -> LatSolverInput {
        LatSolverInput {
            state: SolverState::default(),
            path: LanePath {
                d_poly: [0.0, 0.0, 0.0, offset_m],
                ..Default::default()
            },
            curvature_factor: 1.0 / 2.8,
            v_ego_ms: 20.0,
            path_cost_scale: 1.0,
        }
    }

    #[test]
    fn test_pure_pursuit() {
        let mut solver = PurePursuitSolver::new(PurePursuitParams::default());

        let straight = solver.solve(&input(0.0)).unwrap();
        assert_eq!(straight.delta.len(), 20);
        assert_eq!(straight.delta[1], 0.0);
        assert_eq!(straight.cost, 0.0);

        let left = solver.solve(&input(1.0)).unwrap();
        assert!(left.delta[1] > 0.0);
        assert!(left.rate[0] > 0.0);
        assert!(left.cost > 0.0);

        let right = solver.solve(&input(-1.0)).unwrap();
        assert!(right.delta[1] < 0.0);
    }

    #[test]
    fn test_nan_path_propagates() {
        let mut solver = PurePursuitSolver::new(PurePursuitParams::default());
        let sol = solver.solve(&input(std::f64::NAN)).unwrap();
        assert!(sol.delta[1].is_nan());
    }
}
