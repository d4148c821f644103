//! Implementations for the LatCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::Serialize;

// Internal
use super::{FeedForwardMode, LatCtrlError, Params, SaturationMonitor};
use crate::{
    pid::{PiController, PiInput},
    vehicle::{AngleTrajectory, VehicleState},
};
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

/// Lateral control module state
pub struct LatCtrl {
    pub(crate) params: Params,

    pid: PiController,

    /// Low-pass filtered projection of the measured angle.
    ///
    /// Units: degrees
    dampened_angle_deg: f64,

    /// Last valid desired angle.
    ///
    /// Units: degrees
    angle_des_deg: f64,

    sat_monitor: SaturationMonitor,

    ff_mode: FeedForwardMode,

    /// The filtered angle restarts from the next finite measurement
    resync_angle: bool,

    traj_warn: LogThrottle,
    fault_warn: LogThrottle,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    pub(crate) output: OutputData,
    arch_output: Archiver,
}

/// Input data to lateral control.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Lateral control is engaged
    pub active: bool,

    /// Time at which to sample the trajectory.
    ///
    /// Units: seconds
    pub time_s: f64,

    pub vehicle: VehicleState,

    pub angle_traj: AngleTrajectory,

    /// Units: degrees/second
    pub rate_des_degs: Option<f64>,
}

/// Output of lateral control.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Normalised steering command, positive left.
    pub steer_cmd: f64,

    /// Units: degrees
    pub angle_des_deg: f64,
}

/// Status report for LatCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Steering has been saturated for longer than the dwell time.
    pub saturated: bool,

    /// Instantaneous saturation reported by the PI controller.
    pub pi_saturated: bool,

    pub p: f64,
    pub i: f64,
    pub f: f64,

    pub ff_mode: FeedForwardMode,

    /// No usable sample was found in the trajectory this cycle.
    pub traj_invalid: bool,

    /// The controller produced a command this cycle.
    pub engaged: bool,

    /// A non-finite measurement or command was discarded this cycle
    pub numeric_fault: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LatCtrl {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl State for LatCtrl {
    type InitData = &'static str;
    type InitError = LatCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = LatCtrlError;

    /// Initialise the LatCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        let params: Params = params::load(init_data)?;
        if let Some(name) = params.invalid_lookup() {
            return Err(LatCtrlError::InvalidLookup(name));
        }

        *self = Self::new(params);

        self.arch_report = Archiver::from_path(session, "lat_ctrl/status_report.csv")?;
        self.arch_output = Archiver::from_path(session, "lat_ctrl/output.csv")?;

        Ok(())
    }

    /// Perform cyclic processing of lateral control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        let vehicle = &input_data.vehicle;
        let measurement_finite = vehicle.v_ego_ms.is_finite()
            && vehicle.steer_angle_deg.is_finite()
            && vehicle.steer_rate_degs.is_finite();

        let steer_cmd = if !input_data.active || vehicle.v_ego_ms < self.params.min_speed_ms {
            self.pid.reset();
            self.dampened_angle_deg = vehicle.steer_angle_deg;
            self.angle_des_deg = vehicle.steer_angle_deg;
            self.ff_mode = FeedForwardMode::AngleDominant;
            0.0
        }
        else if !measurement_finite {
            self.report.engaged = true;
            self.update_angle_des(input_data);
            self.numeric_fault(input_data.time_s, "measurement");
            0.0
        }
        else {
            self.report.engaged = true;
            self.update_angle_des(input_data);

            // Project the measured angle forward and filter it
            let projected = vehicle.steer_angle_deg
                + self.params.rate_projection_s * vehicle.steer_rate_degs;
            if self.resync_angle || !self.dampened_angle_deg.is_finite() {
                self.dampened_angle_deg = projected;
                self.resync_angle = false;
            }
            let n = self.params.dampening_samples.max(1.0);
            self.dampened_angle_deg = ((n - 1.0) * self.dampened_angle_deg + projected) / n;

            let steer_max = self.params.steer_max.eval(vehicle.v_ego_ms);
            self.pid.set_limits(-steer_max, steer_max);

            self.ff_mode = self.ff_mode.next(
                input_data.rate_des_degs,
                self.params.rate_ff_enter_degs,
                self.params.rate_ff_exit_degs,
            );

            let mut feedforward = match (self.ff_mode, input_data.rate_des_degs) {
                (FeedForwardMode::RateDominant, Some(rate)) => {
                    self.angle_des_deg + rate * self.params.rate_ff_time_s
                }
                _ => self.angle_des_deg,
            };
            if self.params.torque_actuator {
                feedforward *= vehicle.v_ego_ms.powi(2);
            }

            let cmd = self.pid.update(&PiInput {
                setpoint: self.angle_des_deg,
                measurement: self.dampened_angle_deg,
                speed: vehicle.v_ego_ms,
                check_saturation: vehicle.v_ego_ms > self.params.sat_check_min_speed_ms,
                override_active: vehicle.steer_pressed,
                feedforward,
                deadzone: 0.0,
                freeze_integrator: false,
            });

            if cmd.is_finite() {
                cmd
            }
            else {
                self.numeric_fault(input_data.time_s, "command");
                0.0
            }
        };

        self.report.pi_saturated = self.pid.saturated();
        self.report.saturated = self
            .sat_monitor
            .update(self.pid.saturated(), input_data.time_s);
        self.report.p = self.pid.p();
        self.report.i = self.pid.i();
        self.report.f = self.pid.f();
        self.report.ff_mode = self.ff_mode;

        self.output = OutputData {
            steer_cmd,
            angle_des_deg: self.angle_des_deg,
        };

        trace!(
            "LatCtrl output: steer {:.4}, angle_des {:.3} deg",
            self.output.steer_cmd,
            self.output.angle_des_deg
        );

        Ok((self.output, self.report))
    }
}

impl Archived for LatCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)?;
        self.arch_output.serialise(self.output)?;

        Ok(())
    }
}

impl LatCtrl {
    /// Create a new controller from its parameters, without archives.
    pub fn new(params: Params) -> Self {
        let pid = PiController::new(params.gains.clone(), params.rate_hz, params.sat_limit);
        let sat_monitor = SaturationMonitor::new(params.sat_dwell_s);
        let traj_warn = LogThrottle::new(params.traj_warn_period_s);
        let fault_warn = LogThrottle::new(params.fault_warn_period_s);

        Self {
            params,
            pid,
            dampened_angle_deg: 0.0,
            angle_des_deg: 0.0,
            sat_monitor,
            ff_mode: FeedForwardMode::AngleDominant,
            resync_angle: false,
            traj_warn,
            fault_warn,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            output: OutputData::default(),
            arch_output: Archiver::default(),
        }
    }

    /// Clear the controller state.
    pub fn reset(&mut self) {
        self.pid.reset();
        self.sat_monitor.reset();
        self.ff_mode = FeedForwardMode::AngleDominant;
        self.dampened_angle_deg = 0.0;
        self.resync_angle = false;
        self.angle_des_deg = 0.0;
    }

    /// Current integrator value of the PI controller.
    pub fn integrator(&self) -> f64 {
        self.pid.i()
    }

    /// Drop the PI state after a non-finite value, so that feedback restarts
    /// from the next finite measurement.
    fn numeric_fault(&mut self, time_s: f64, source: &str) {
        self.report.numeric_fault = true;
        self.pid.reset();
        self.sat_monitor.reset();
        self.resync_angle = true;

        if self.fault_warn.ready(time_s) {
            warn!(
                "Non-finite lateral {}, steering released ({} warnings suppressed)",
                source,
                self.fault_warn.take_suppressed()
            );
        }
    }

    /// Sample the trajectory, holding the last valid angle if it has no
    /// usable samples.
    fn update_angle_des(&mut self, input_data: &InputData) {
        let (angle, dropped) = input_data.angle_traj.angle_at(input_data.time_s);

        match angle {
            Some(a) => {
                if dropped > 0 {
                    trace!("Dropped {} non-finite trajectory samples", dropped);
                }
                self.angle_des_deg = a;
            }
            None => {
                self.report.traj_invalid = true;
                if self.traj_warn.ready(input_data.time_s) {
                    warn!(
                        "No valid samples in the angle trajectory, holding {:.3} deg \
                        ({} warnings suppressed)",
                        self.angle_des_deg,
                        self.traj_warn.take_suppressed()
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn input(v_ego_ms: f64, time_s: f64) -> InputData {
        InputData {
            active: true,
            time_s,
            vehicle: VehicleState {
                v_ego_ms,
                steer_angle_deg: 1.0,
                ..Default::default()
            },
            angle_traj: AngleTrajectory::new(vec![(time_s, 5.0), (time_s + 0.05, 6.0)]),
            rate_des_degs: None,
        }
    }

    #[test]
    fn test_zero_below_min_speed() {
        let mut lat = LatCtrl::new(Params {
            gains: crate::pid::PiGains {
                k_p: util::maths::Lookup::constant(0.05),
                k_i: util::maths::Lookup::constant(0.05),
                k_f: 0.00005,
            },
            ..Default::default()
        });

        // Wind the integrator up first
        for k in 0..50 {
            lat.proc(&input(15.0, k as f64 * 0.01)).unwrap();
        }
        assert!(lat.integrator() != 0.0);

        let (out, report) = lat.proc(&input(0.29, 0.5)).unwrap();
        assert_eq!(out.steer_cmd, 0.0);
        assert_eq!(out.angle_des_deg, 1.0);
        assert_eq!(lat.integrator(), 0.0);
        assert!(!report.engaged);

        let mut inactive = input(15.0, 0.51);
        inactive.active = false;
        let (out, _) = lat.proc(&inactive).unwrap();
        assert_eq!(out.steer_cmd, 0.0);
        assert_eq!(lat.integrator(), 0.0);
    }

    #[test]
    fn test_tracks_towards_desired() {
        let mut lat = LatCtrl::default();

        let (out, report) = lat.proc(&input(15.0, 0.0)).unwrap();
        assert!(report.engaged);
        assert_eq!(out.angle_des_deg, 5.0);
        assert!(out.steer_cmd > 0.0);
        assert!(out.steer_cmd <= 1.0);
    }

    #[test]
    fn test_invalid_traj_holds_angle() {
        let mut lat = LatCtrl::default();
        lat.proc(&input(15.0, 0.0)).unwrap();

        let mut bad = input(15.0, 0.01);
        bad.angle_traj = AngleTrajectory::new(vec![(0.01, std::f64::NAN)]);
        let (out, report) = lat.proc(&bad).unwrap();

        assert!(report.traj_invalid);
        assert_eq!(out.angle_des_deg, 5.0);
        assert!(out.steer_cmd.is_finite());
    }

    #[test]
    fn test_non_finite_angle_faults_and_recovers() {
        let mut lat = LatCtrl::default();

        for k in 0..20 {
            let (out, report) = lat.proc(&input(15.0, k as f64 * 0.01)).unwrap();
            assert!(out.steer_cmd > 0.0);
            assert!(!report.numeric_fault);
        }

        let mut bad = input(15.0, 0.2);
        bad.vehicle.steer_angle_deg = std::f64::NAN;
        let (out, report) = lat.proc(&bad).unwrap();
        assert!(report.numeric_fault);
        assert!(report.engaged);
        assert_eq!(out.steer_cmd, 0.0);
        assert_eq!(lat.integrator(), 0.0);

        let mut bad_rate = input(15.0, 0.21);
        bad_rate.vehicle.steer_rate_degs = std::f64::INFINITY;
        let (out, report) = lat.proc(&bad_rate).unwrap();
        assert!(report.numeric_fault);
        assert_eq!(out.steer_cmd, 0.0);

        // Feedback resumes from the next finite measurement, not just the
        // feed-forward term
        let feedforward_only = 5.0 * 15.0_f64.powi(2) * 0.00005;
        for k in 22..60 {
            let (out, report) = lat.proc(&input(15.0, k as f64 * 0.01)).unwrap();
            assert!(!report.numeric_fault);
            assert!(out.steer_cmd.is_finite());
            assert!(report.p > 0.9);
            assert!(out.steer_cmd > feedforward_only);
        }
    }

    #[test]
    fn test_saturation_dwell_and_clear() {
        let mut lat = LatCtrl::default();

        // Desired angle far from the measurement saturates the PI
        let mut first_pi_sat = None;
        let mut raised = false;
        for k in 0..200 {
            let t = k as f64 * 0.01;
            let (_, report) = lat.proc(&input(15.0, t)).unwrap();

            if report.pi_saturated && first_pi_sat.is_none() {
                first_pi_sat = Some(t);
            }
            match first_pi_sat {
                None => assert!(!report.saturated),
                Some(t0) if t - t0 < 0.69 => assert!(!report.saturated),
                Some(t0) if t - t0 > 0.71 => assert!(report.saturated),
                Some(_) => (),
            }
            raised |= report.saturated;
        }
        assert!(first_pi_sat.is_some());
        assert!(raised);

        // Track the measurement, the flag drops with the PI saturation
        let mut cleared = false;
        for k in 200..400 {
            let t = k as f64 * 0.01;
            let mut i = input(15.0, t);
            i.angle_traj = AngleTrajectory::new(vec![(t, 1.0), (t + 0.05, 1.0)]);
            let (_, report) = lat.proc(&i).unwrap();

            assert_eq!(report.saturated, report.pi_saturated);
            if !report.pi_saturated {
                cleared = true;
                break;
            }
        }
        assert!(cleared);
    }

    #[test]
    fn test_no_saturation_below_check_speed() {
        let mut lat = LatCtrl::default();

        for k in 0..300 {
            let (out, report) = lat.proc(&input(8.0, k as f64 * 0.01)).unwrap();
            assert_eq!(out.steer_cmd, 1.0);
            assert!(!report.pi_saturated);
            assert!(!report.saturated);
        }
    }

    #[test]
    fn test_rate_dominant_mode() {
        let mut lat = LatCtrl::default();

        let mut i = input(15.0, 0.0);
        i.rate_des_degs = Some(20.0);
        let (_, report) = lat.proc(&i).unwrap();
        assert_eq!(report.ff_mode, FeedForwardMode::RateDominant);

        i.rate_des_degs = None;
        let (_, report) = lat.proc(&i).unwrap();
        assert_eq!(report.ff_mode, FeedForwardMode::AngleDominant);
    }
}
