//! Implementations for the LongCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use serde::Serialize;

// Internal
use super::{
    long_ctrl_state_trans, LongCtrlError, LongCtrlState, Params, TransitionInput,
    BRAKE_STOPPING_TARGET, MIN_CAN_SPEED_MS, STARTING_BRAKE_RATE, STOPPING_BRAKE_RATE,
};
use crate::{
    pid::{PiController, PiInput},
    vehicle::{GasProfile, LeadState, VehicleState},
};
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

/// Longitudinal control module state
pub struct LongCtrl {
    pub(crate) params: Params,

    pid: PiController,

    state: LongCtrlState,

    /// PI setpoint.
    ///
    /// Units: meters/second
    v_pid_ms: f64,

    /// Combined gas (positive) and brake (negative) output of the last cycle.
    last_output_gb: f64,

    /// Remaining cycles of forced braking.
    fcw_countdown: u32,

    /// Integrator was frozen by a pedal press on the last cycle
    pedal_freeze: bool,

    /// Relative speed of the last lead seen.
    ///
    /// Units: meters/second
    last_lead_v_rel_ms: Option<f64>,

    /// Cycles since a lead was last reported, saturating at the hold length.
    lead_none_count: u32,

    fault_warn: LogThrottle,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    pub(crate) output: OutputData,
    arch_output: Archiver,
}

/// Input data to longitudinal control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Longitudinal control is engaged
    pub active: bool,

    /// Units: seconds
    pub time_s: f64,

    pub vehicle: VehicleState,

    /// Units: meters/second
    pub v_target_ms: f64,

    /// Units: meters/second
    pub v_target_future_ms: f64,

    /// Units: meters/second^2
    pub a_target_mss: f64,

    /// Forward collision warning raised this cycle
    pub fcw: bool,

    /// Lead vehicle reported this cycle, if any
    pub lead: Option<LeadState>,

    pub gas_profile: GasProfile,
}

/// Output of longitudinal control.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Gas demand between 0 and 1
    pub gas: f64,

    /// Brake demand between 0 and 1
    pub brake: f64,
}

/// Status report for LongCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub state: LongCtrlState,

    /// Units: meters/second
    pub v_pid_ms: f64,

    pub output_gb: f64,

    pub p: f64,
    pub i: f64,
    pub f: f64,

    /// Gas limit applied this cycle
    pub gas_max: f64,

    /// Braking is forced by a collision warning
    pub fcw_active: bool,

    /// The PI output was not finite and has been discarded
    pub numeric_fault: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LongCtrl {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl State for LongCtrl {
    type InitData = &'static str;
    type InitError = LongCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = LongCtrlError;

    /// Initialise the LongCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        let params: Params = params::load(init_data)?;
        if let Some(name) = params.invalid_lookup() {
            return Err(LongCtrlError::InvalidLookup(name));
        }

        *self = Self::new(params);

        self.arch_report = Archiver::from_path(session, "long_ctrl/status_report.csv")?;
        self.arch_output = Archiver::from_path(session, "long_ctrl/output.csv")?;

        Ok(())
    }

    /// Perform cyclic processing of longitudinal control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        let vehicle = &input_data.vehicle;
        let v_ego = vehicle.v_ego_ms;

        let lead_v_rel_ms = self.update_lead(input_data.lead, v_ego);
        let gas_max = self.params.gas_max(input_data.gas_profile, v_ego, lead_v_rel_ms);
        let brake_max = self.params.brake_max.eval(v_ego);

        let prev_state = self.state;
        self.state = long_ctrl_state_trans(self.state, &TransitionInput {
            active: input_data.active,
            v_ego_ms: v_ego,
            v_target_ms: input_data.v_target_future_ms,
            v_pid_ms: self.v_pid_ms,
            output_gb: self.last_output_gb,
            brake_pressed: vehicle.brake_pressed,
            cruise_standstill: vehicle.cruise_standstill,
            min_engage_speed_ms: self.params.min_engage_speed_ms,
        });

        if self.state != prev_state {
            debug!("LongCtrl state {:?} -> {:?}", prev_state, self.state);
        }

        // The bus reports zero below the minimum speed, avoid the jump
        let v_ego_pid = v_ego.max(MIN_CAN_SPEED_MS);

        let mut output_gb = self.last_output_gb;

        match self.state {
            LongCtrlState::Off => {
                self.v_pid_ms = v_ego_pid;
                self.pid.reset();
                output_gb = 0.0;
            }
            LongCtrlState::Tracking => {
                self.v_pid_ms = input_data.v_target_ms;
                self.pid.set_limits(-brake_max, gas_max);

                let prevent_overshoot = !self.params.stopping_control
                    && v_ego < 1.5
                    && input_data.v_target_future_ms < 0.7;

                // Drop the integrator once when a pedal is first pressed
                let pedal = vehicle.gas_pressed || vehicle.brake_pressed;
                if pedal && !self.pedal_freeze {
                    self.pid.reset_integrator();
                }
                self.pedal_freeze = pedal;

                output_gb = self.pid.update(&PiInput {
                    setpoint: self.v_pid_ms,
                    measurement: v_ego_pid,
                    speed: v_ego_pid,
                    check_saturation: true,
                    override_active: false,
                    feedforward: input_data.a_target_mss,
                    deadzone: self.params.deadzone.eval(v_ego_pid),
                    freeze_integrator: prevent_overshoot || pedal,
                });

                if prevent_overshoot {
                    output_gb = output_gb.min(0.0);
                }
            }
            LongCtrlState::Stopping => {
                // Keep braking until stopped and held
                if !vehicle.standstill || output_gb > -BRAKE_STOPPING_TARGET {
                    output_gb -= STOPPING_BRAKE_RATE / self.params.rate_hz;
                }
                output_gb = clamp(output_gb, -brake_max, gas_max);

                self.v_pid_ms = v_ego;
                self.pid.reset();
            }
            LongCtrlState::Starting => {
                if output_gb < -0.2 {
                    output_gb += STARTING_BRAKE_RATE / self.params.rate_hz;
                }

                self.v_pid_ms = v_ego;
                self.pid.reset();
            }
        }

        if !output_gb.is_finite() {
            self.report.numeric_fault = true;
            if self.fault_warn.ready(input_data.time_s) {
                warn!(
                    "Non-finite longitudinal output, resetting ({} warnings suppressed)",
                    self.fault_warn.take_suppressed()
                );
            }
            self.pid.reset();
            output_gb = 0.0;
        }

        self.last_output_gb = output_gb;

        let mut gas = clamp(output_gb, 0.0, gas_max);
        let mut brake = -clamp(output_gb, -brake_max, 0.0);

        if input_data.fcw {
            self.fcw_countdown = self.params.fcw_countdown_cycles;
        }
        if self.fcw_countdown > 0 {
            self.fcw_countdown -= 1;
            self.report.fcw_active = true;
            gas = 0.0;
            brake = 1.0;
        }

        self.output = OutputData { gas, brake };

        self.report.state = self.state;
        self.report.v_pid_ms = self.v_pid_ms;
        self.report.output_gb = output_gb;
        self.report.gas_max = gas_max;
        self.report.p = self.pid.p();
        self.report.i = self.pid.i();
        self.report.f = self.pid.f();

        trace!("LongCtrl output: gas {:.3}, brake {:.3}", gas, brake);

        Ok((self.output, self.report))
    }
}

impl Archived for LongCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)?;
        self.arch_output.serialise(self.output)?;

        Ok(())
    }
}

impl LongCtrl {
    /// Create a new controller from its parameters, without archives.
    pub fn new(params: Params) -> Self {
        let pid = PiController::new(params.gains.clone(), params.rate_hz, params.sat_limit)
            .with_output_scale(params.gb_per_accel);
        let fault_warn = LogThrottle::new(params.fault_warn_period_s);
        let lead_none_count = params.lead_hold_cycles;

        Self {
            params,
            pid,
            state: LongCtrlState::Off,
            v_pid_ms: 0.0,
            last_output_gb: 0.0,
            fcw_countdown: 0,
            pedal_freeze: false,
            last_lead_v_rel_ms: None,
            lead_none_count,
            fault_warn,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            output: OutputData::default(),
            arch_output: Archiver::default(),
        }
    }

    /// Return to the off state and clear the PI controller, with the setpoint
    /// at `v_pid_ms`.
    pub fn reset(&mut self, v_pid_ms: f64) {
        self.pid.reset();
        self.state = LongCtrlState::Off;
        self.v_pid_ms = v_pid_ms;
        self.last_output_gb = 0.0;
        self.fcw_countdown = 0;
        self.pedal_freeze = false;
    }

    pub fn state(&self) -> LongCtrlState {
        self.state
    }

    /// Current integrator value of the PI controller.
    pub fn integrator(&self) -> f64 {
        self.pid.i()
    }

    /// Remember the lead and return its relative speed while it was seen
    /// within the hold length.
    fn update_lead(&mut self, lead: Option<LeadState>, v_ego_ms: f64) -> Option<f64> {
        match lead {
            Some(l) => {
                self.last_lead_v_rel_ms = Some(l.v_lead_ms - v_ego_ms);
                self.lead_none_count = 0;
            }
            None => {
                self.lead_none_count = (self.lead_none_count + 1).min(self.params.lead_hold_cycles);
            }
        }

        if self.lead_none_count < self.params.lead_hold_cycles {
            self.last_lead_v_rel_ms
        }
        else {
            None
        }
    }
}
