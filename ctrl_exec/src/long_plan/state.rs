//! Implementations for the LongPlan state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::Serialize;

// Internal
use super::{
    CruiseSolver, LongPlanError, LongSolution, LongSolverInput, LongitudinalSolver, Params,
    BACKWARDS_SPEED_MS, CRASHING_GAP_M, FUTURE_STEP, TARGET_STEP,
};
use crate::vehicle::{LeadState, VehicleState};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    logger::LogThrottle,
    maths::clamp,
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Longitudinal planning module state
pub struct LongPlan {
    pub(crate) params: Params,

    solver: Box<dyn LongitudinalSolver>,

    fault_warn: LogThrottle,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    pub(crate) output: OutputData,
}

/// Input data to longitudinal planning.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Longitudinal control is engaged
    pub enabled: bool,

    /// Units: seconds
    pub time_s: f64,

    pub vehicle: VehicleState,

    pub lead: Option<LeadState>,

    /// Units: meters/second
    pub v_cruise_ms: f64,
}

/// Targets for longitudinal control.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Units: meters/second
    pub v_target_ms: f64,

    /// Units: meters/second
    pub v_target_future_ms: f64,

    /// Units: meters/second^2
    pub a_target_mss: f64,
}

/// Result of the solution sanity checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SanityCheck {
    /// The plan puts the ego vehicle through the lead
    pub crashing: bool,

    /// The plan contains non-finite speeds
    pub nans: bool,

    /// The plan reverses
    pub backwards: bool,
}

/// Status report for LongPlan processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub has_lead: bool,

    pub crashing: bool,
    pub nans: bool,
    pub backwards: bool,

    /// The solver was reset and the fallback target used
    pub solver_reset: bool,

    /// The solver returned an error
    pub solver_error: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LongPlan {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl State for LongPlan {
    type InitData = &'static str;
    type InitError = LongPlanError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = LongPlanError;

    /// Initialise the LongPlan module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        *self = Self::new(params::load(init_data)?);

        self.arch_report = Archiver::from_path(session, "long_plan/status_report.csv")?;

        Ok(())
    }

    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        let vehicle = &input_data.vehicle;
        let has_lead = input_data.lead.is_some();
        self.report.has_lead = has_lead;

        // Hold the current speed while disengaged, never planning to
        // accelerate
        if !input_data.enabled {
            self.solver.reset();
            self.output = OutputData {
                v_target_ms: vehicle.v_ego_ms,
                v_target_future_ms: vehicle.v_ego_ms,
                a_target_mss: vehicle.a_ego_mss.min(0.0),
            };
            return Ok((self.output, self.report));
        }

        let result = self.solver.solve(&LongSolverInput {
            v_ego_ms: vehicle.v_ego_ms,
            a_ego_mss: vehicle.a_ego_mss,
            lead: input_data
                .lead
                .map(|l| (l.x_rel_m, l.v_lead_ms.max(0.0), l.a_lead_mss)),
            v_cruise_ms: input_data.v_cruise_ms,
        });

        let solution = match result {
            Ok(sol) if sol.v_ego.len() > FUTURE_STEP && sol.a_ego.len() > TARGET_STEP => {
                let check = sanity_check(&sol);
                self.report.crashing = check.crashing;
                self.report.nans = check.nans;
                self.report.backwards = check.backwards;

                if ((check.backwards || check.crashing) && has_lead) || check.nans {
                    None
                } else {
                    Some(sol)
                }
            }
            Ok(sol) => {
                trace!("Longitudinal solution too short: {} steps", sol.v_ego.len());
                self.report.solver_error = true;
                None
            }
            Err(e) => {
                trace!("Longitudinal solver error: {}", e);
                self.report.solver_error = true;
                None
            }
        };

        self.output = match solution {
            Some(sol) => OutputData {
                v_target_ms: sol.v_ego[TARGET_STEP],
                v_target_future_ms: sol.v_ego[FUTURE_STEP].min(input_data.v_cruise_ms),
                a_target_mss: sol.a_ego[TARGET_STEP],
            },
            None => {
                self.report.solver_reset = true;
                if self.fault_warn.ready(input_data.time_s) {
                    warn!(
                        "Longitudinal solver reset - backwards: {} crashing: {} nan: {} \
                        error: {} ({} warnings suppressed)",
                        self.report.backwards,
                        self.report.crashing,
                        self.report.nans,
                        self.report.solver_error,
                        self.fault_warn.take_suppressed()
                    );
                }
                self.solver.reset();
                self.fallback(vehicle.v_ego_ms, input_data.v_cruise_ms)
            }
        };

        trace!(
            "LongPlan: v_target {:.3}, v_future {:.3}, a_target {:.3}",
            self.output.v_target_ms,
            self.output.v_target_future_ms,
            self.output.a_target_mss
        );

        Ok((self.output, self.report))
    }
}

impl Archived for LongPlan {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)
    }
}

impl LongPlan {
    /// Create a planner using the cruise solver.
    pub fn new(params: Params) -> Self {
        let solver = Box::new(CruiseSolver::new(params.cruise_solver.clone()));
        Self::with_solver(params, solver)
    }

    /// Create a planner around the given solver.
    pub fn with_solver(params: Params, solver: Box<dyn LongitudinalSolver>) -> Self {
        let fault_warn = LogThrottle::new(params.fault_warn_period_s);

        Self {
            params,
            solver,
            fault_warn,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            output: OutputData::default(),
        }
    }

    pub fn reset(&mut self) {
        self.solver.reset();
        self.output = OutputData::default();
    }

    /// Hold the current speed, decelerating gently if above the cruise speed.
    fn fallback(&self, v_ego_ms: f64, v_cruise_ms: f64) -> OutputData {
        let a_target_mss = clamp(
            self.params.fallback_k * (v_cruise_ms - v_ego_ms),
            -self.params.fallback_decel_mss,
            0.0,
        );

        OutputData {
            v_target_ms: v_ego_ms,
            v_target_future_ms: v_ego_ms.min(v_cruise_ms),
            a_target_mss,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Check a longitudinal solution for physically impossible plans.
pub fn sanity_check(sol: &LongSolution) -> SanityCheck {
    let crashing = sol
        .x_lead
        .iter()
        .zip(sol.x_ego.iter())
        .any(|(lead, ego)| lead - ego < CRASHING_GAP_M);

    let nans = sol.v_ego.iter().any(|v| v.is_nan());

    let backwards = sol
        .v_ego
        .iter()
        .cloned()
        .fold(std::f64::INFINITY, f64::min)
        < BACKWARDS_SPEED_MS;

    SanityCheck {
        crashing,
        nans,
        backwards,
    }
}
