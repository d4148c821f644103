//! Implementations for the PathPlan state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::Serialize;
use std::time::Instant;

// Internal
use super::{
    calc_states_after_delay, Desire, LaneChangeArbiter, LaneChangeState, LanePath,
    LatSolverInput, LateralSolver, Params, PathPlanError, PurePursuitSolver, SolverState,
    DT_PLAN_S, MAX_SOLUTION_COST, MIN_SOLVER_SPEED_MS,
};
use crate::vehicle::{AngleTrajectory, LaneChangeDirection, LanePerception, VehicleState};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    logger::LogThrottle,
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Path planning module state
pub struct PathPlan {
    pub(crate) params: Params,

    arbiter: LaneChangeArbiter,

    solver: Box<dyn LateralSolver>,

    /// Solver start state, carried between cycles
    cur_state: SolverState,

    /// Units: degrees
    angle_des_deg: f64,

    /// Consecutive invalid solutions
    invalid_cnt: u32,

    fault_warn: LogThrottle,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    pub(crate) output: OutputData,
}

/// Input data to path planning.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Lateral control is engaged
    pub active: bool,

    /// Units: seconds
    pub time_s: f64,

    pub vehicle: VehicleState,

    pub lanes: LanePerception,
}

/// Output of path planning.
#[derive(Debug, Clone, Default)]
pub struct OutputData {
    /// Desired angle now and one planning cycle ahead
    pub angle_traj: AngleTrajectory,

    /// Units: degrees/second
    pub rate_des_degs: f64,

    pub desire: Desire,

    pub lane_change_state: LaneChangeState,

    pub lane_change_direction: LaneChangeDirection,

    /// Fewer than two invalid solutions in a row
    pub solution_valid: bool,

    pub path: LanePath,
}

/// Status report for PathPlan processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub lane_change_state: LaneChangeState,

    pub desire: Desire,

    /// Units: degrees
    pub angle_des_deg: f64,

    /// Units: degrees/second
    pub rate_des_degs: f64,

    pub cost: f64,

    pub solution_valid: bool,

    /// The solver failed or returned non-finite angles and was reset
    pub solver_fault: bool,

    /// The solution took longer than the budget and was discarded
    pub over_budget: bool,

    /// Units: seconds
    pub solve_time_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PathPlan {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl State for PathPlan {
    type InitData = &'static str;
    type InitError = PathPlanError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = PathPlanError;

    /// Initialise the PathPlan module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        *self = Self::new(params::load(init_data)?);

        self.arch_report = Archiver::from_path(session, "path_plan/status_report.csv")?;

        Ok(())
    }

    /// Run one planning cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        let vehicle = &input_data.vehicle;
        let v_ego = vehicle.v_ego_ms;
        let steer_ratio = self.params.vehicle.steer_ratio;
        let angle_deg = vehicle.steer_angle_deg - self.params.angle_offset_deg;
        let curvature_factor = self.params.vehicle.curvature_factor(v_ego);

        let angle_des_prev_deg = self.angle_des_deg;

        // ---- LANE CHANGE ----

        let desire = self.arbiter.update(
            input_data.active,
            vehicle,
            input_data.lanes.lane_change_prob(),
        );

        // The lane lines are meaningless while crossing them
        let lane_changing = desire != Desire::None;
        let path = LanePath::from_perception(&input_data.lanes, lane_changing);

        // ---- SOLVE ----

        calc_states_after_delay(
            &mut self.cur_state,
            v_ego,
            angle_deg,
            curvature_factor,
            steer_ratio,
            self.params.steer_actuator_delay_s,
        );

        let solver_input = LatSolverInput {
            state: self.cur_state,
            path,
            curvature_factor,
            v_ego_ms: v_ego.max(MIN_SOLVER_SPEED_MS),
            path_cost_scale: if lane_changing { 0.1 } else { 1.0 },
        };

        let start = Instant::now();
        let result = self.solver.solve(&solver_input);
        self.report.solve_time_s = start.elapsed().as_secs_f64();

        if self.report.solve_time_s > self.params.solver_budget_s {
            self.report.over_budget = true;
            if self.fault_warn.ready(input_data.time_s) {
                warn!(
                    "Lateral solver took {:.4} s, reusing the previous trajectory \
                    ({} warnings suppressed)",
                    self.report.solve_time_s,
                    self.fault_warn.take_suppressed()
                );
            }

            self.output.desire = desire;
            self.output.lane_change_state = self.arbiter.state();
            self.output.lane_change_direction = self.arbiter.direction();
            self.output.path = path;
            self.fill_report(desire);

            return Ok((self.output.clone(), self.report));
        }

        let measured_delta = angle_deg.to_radians() / steer_ratio;

        let solution = match result {
            Ok(sol) if sol.delta.len() >= 2 && !sol.rate.is_empty() => Some(sol),
            Ok(sol) => {
                trace!("Lateral solution too short: {} steps", sol.delta.len());
                None
            }
            Err(e) => {
                trace!("Lateral solver error: {}", e);
                None
            }
        };

        let nans = solution
            .as_ref()
            .map_or(true, |s| s.delta.iter().any(|d| d.is_nan()));

        // Follow the measured angle when not steering
        let (mut delta, mut rate_des_degs) = match (&solution, input_data.active) {
            (Some(s), true) => (s.delta[1], (s.rate[0] * steer_ratio).to_degrees()),
            _ => (measured_delta, 0.0),
        };

        if nans {
            self.report.solver_fault = true;
            self.solver.reset();
            delta = measured_delta;
            rate_des_degs = 0.0;

            if self.fault_warn.ready(input_data.time_s) {
                warn!(
                    "Lateral solver fault, reset to the measured angle ({} warnings suppressed)",
                    self.fault_warn.take_suppressed()
                );
            }
        }

        self.cur_state.delta = delta;

        let angle_des_deg = (delta * steer_ratio).to_degrees() + self.params.angle_offset_deg;
        self.angle_des_deg = self.params.lane_hug.apply(angle_des_deg);

        let cost = solution.as_ref().map_or(std::f64::NAN, |s| s.cost);
        if cost > MAX_SOLUTION_COST || nans {
            self.invalid_cnt += 1;
        }
        else {
            self.invalid_cnt = 0;
        }

        self.output = OutputData {
            angle_traj: AngleTrajectory::new(vec![
                (input_data.time_s, angle_des_prev_deg),
                (input_data.time_s + DT_PLAN_S, self.angle_des_deg),
            ]),
            rate_des_degs,
            desire,
            lane_change_state: self.arbiter.state(),
            lane_change_direction: self.arbiter.direction(),
            solution_valid: self.invalid_cnt < 2,
            path,
        };

        self.report.cost = cost;
        self.fill_report(desire);

        trace!(
            "PathPlan: angle_des {:.3} deg, rate {:.3} deg/s, {:?}",
            self.angle_des_deg,
            rate_des_degs,
            self.output.lane_change_state
        );

        Ok((self.output.clone(), self.report))
    }
}

impl Archived for PathPlan {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)
    }
}

impl PathPlan {
    /// Create a planner using the pure pursuit solver.
    pub fn new(params: Params) -> Self {
        let solver = Box::new(PurePursuitSolver::new(params.pure_pursuit.clone()));
        Self::with_solver(params, solver)
    }

    /// Create a planner around the given solver.
    pub fn with_solver(params: Params, solver: Box<dyn LateralSolver>) -> Self {
        let arbiter = LaneChangeArbiter::new(params.lane_change.clone());
        let fault_warn = LogThrottle::new(params.fault_warn_period_s);

        Self {
            params,
            arbiter,
            solver,
            cur_state: SolverState::default(),
            angle_des_deg: 0.0,
            invalid_cnt: 0,
            fault_warn,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            output: OutputData::default(),
        }
    }

    pub fn reset(&mut self) {
        self.arbiter.reset();
        self.solver.reset();
        self.cur_state = SolverState::default();
        self.angle_des_deg = 0.0;
        self.invalid_cnt = 0;
        self.output = OutputData::default();
    }

    fn fill_report(&mut self, desire: Desire) {
        self.report.lane_change_state = self.output.lane_change_state;
        self.report.desire = desire;
        self.report.angle_des_deg = self.angle_des_deg;
        self.report.rate_des_degs = self.output.rate_des_degs;
        self.report.solution_valid = self.output.solution_valid;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path_plan::{LatSolution, PurePursuitParams};
    use crate::solver::SolverError;

    /// Returns a fixed solution after an optional delay.
    struct FixedSolver {
        solution: Result<LatSolution, SolverError>,
        delay_ms: u64,
        resets: usize,
    }

    impl LateralSolver for FixedSolver {
        fn solve(&mut self, _: &LatSolverInput) -> Result<LatSolution, SolverError> {
            if self.delay_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(self.delay_ms));
            }
            self.solution.clone()
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn fixed(delta: f64, cost: f64) -> Box<FixedSolver> {
        Box::new(FixedSolver {
            solution: Ok(LatSolution {
                delta: vec![0.0, delta, delta],
                rate: vec![0.0; 3],
                cost,
            }),
            delay_ms: 0,
            resets: 0,
        })
    }

    fn input(time_s: f64, angle_deg: f64) -> InputData {
        InputData {
            active: true,
            time_s,
            vehicle: VehicleState {
                v_ego_ms: 25.0,
                steer_angle_deg: angle_deg,
                ..Default::default()
            },
            lanes: LanePerception::default(),
        }
    }

    #[test]
    fn test_trajectory() {
        let params = Params::default();
        let steer_ratio = params.vehicle.steer_ratio;
        let mut pp = PathPlan::with_solver(params, fixed(0.01, 10.0));

        let (out, report) = pp.proc(&input(1.0, 0.0)).unwrap();
        let expected = (0.01 * steer_ratio).to_degrees();

        assert_eq!(out.angle_traj.samples.len(), 2);
        assert_eq!(out.angle_traj.samples[0], (1.0, 0.0));
        assert_eq!(out.angle_traj.samples[1].0, 1.0 + DT_PLAN_S);
        assert!((out.angle_traj.samples[1].1 - expected).abs() < 1e-9);
        assert!(out.solution_valid);
        assert!(!report.solver_fault);

        // The next trajectory starts from the last desired angle
        let (out, _) = pp.proc(&input(1.05, 0.0)).unwrap();
        assert!((out.angle_traj.samples[0].1 - expected).abs() < 1e-9);
    }

    #[test]
    fn test_nan_falls_back_to_measured() {
        let mut pp = PathPlan::with_solver(Params::default(), fixed(std::f64::NAN, 10.0));

        let (out, report) = pp.proc(&input(0.0, 4.0)).unwrap();
        assert!(report.solver_fault);
        assert!((out.angle_traj.samples[1].1 - 4.0).abs() < 1e-9);
        assert_eq!(out.rate_des_degs, 0.0);

        // Valid until two faults in a row
        assert!(out.solution_valid);
        let (out, _) = pp.proc(&input(0.05, 4.0)).unwrap();
        assert!(!out.solution_valid);
    }

    #[test]
    fn test_high_cost_invalid() {
        let mut pp = PathPlan::with_solver(Params::default(), fixed(0.0, 30000.0));
        let (out, _) = pp.proc(&input(0.0, 0.0)).unwrap();
        assert!(out.solution_valid);
        let (out, report) = pp.proc(&input(0.05, 0.0)).unwrap();
        assert!(!out.solution_valid);
        assert!(!report.solver_fault);
    }

    #[test]
    fn test_solver_error_resets() {
        let mut pp = PathPlan::with_solver(
            Params::default(),
            Box::new(FixedSolver {
                solution: Err(SolverError::Infeasible),
                delay_ms: 0,
                resets: 0,
            }),
        );

        let (out, report) = pp.proc(&input(0.0, -3.0)).unwrap();
        assert!(report.solver_fault);
        assert!((out.angle_traj.samples[1].1 + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_over_budget_reuses_trajectory() {
        let params = Params {
            solver_budget_s: 0.001,
            ..Default::default()
        };
        let mut pp = PathPlan::with_solver(params, fixed(0.01, 0.0));
        let (first, _) = pp.proc(&input(0.0, 0.0)).unwrap();

        pp.solver = Box::new(FixedSolver {
            solution: Ok(LatSolution {
                delta: vec![0.0, 0.2],
                rate: vec![0.0],
                cost: 0.0,
            }),
            delay_ms: 20,
            resets: 0,
        });
        let (second, report) = pp.proc(&input(0.05, 0.0)).unwrap();
        assert!(report.over_budget);
        assert_eq!(second.angle_traj, first.angle_traj);
    }

    #[test]
    fn test_inactive_follows_measured() {
        let mut pp = PathPlan::new(Params {
            pure_pursuit: PurePursuitParams::default(),
            ..Default::default()
        });

        let mut i = input(0.0, 7.0);
        i.active = false;
        let (out, _) = pp.proc(&i).unwrap();
        assert!((out.angle_traj.samples[1].1 - 7.0).abs() < 1e-9);
        assert_eq!(out.lane_change_state, LaneChangeState::Off);
    }
}
