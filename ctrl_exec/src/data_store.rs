//! # Data Store

use crate::{
    car_ctrl, lat_ctrl, long_ctrl, long_plan, path_plan,
    vehicle::{ControlTarget, DriveInput},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// True if the planners run this cycle
    pub is_plan_cycle: bool,

    /// Simulation elapsed time
    pub sim_time_s: f64,

    /// Latest input from outside the control core
    pub drive_input: DriveInput,

    /// Targets handed from the planners to the controllers
    pub target: ControlTarget,

    // PathPlan
    pub path_plan: path_plan::PathPlan,
    pub path_plan_output: path_plan::OutputData,
    pub path_plan_status_rpt: path_plan::StatusReport,

    // LongPlan
    pub long_plan: long_plan::LongPlan,
    pub long_plan_output: long_plan::OutputData,
    pub long_plan_status_rpt: long_plan::StatusReport,

    // LatCtrl
    pub lat_ctrl: lat_ctrl::LatCtrl,
    pub lat_ctrl_input: lat_ctrl::InputData,
    pub lat_ctrl_output: lat_ctrl::OutputData,
    pub lat_ctrl_status_rpt: lat_ctrl::StatusReport,

    // LongCtrl
    pub long_ctrl: long_ctrl::LongCtrl,
    pub long_ctrl_input: long_ctrl::InputData,
    pub long_ctrl_output: long_ctrl::OutputData,
    pub long_ctrl_status_rpt: long_ctrl::StatusReport,

    // CarCtrl
    pub car_ctrl: car_ctrl::CarCtrl,
    pub car_ctrl_input: car_ctrl::InputData,
    pub car_ctrl_output: car_ctrl::OutputData,
    pub car_ctrl_status_rpt: car_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of cycles in which the bus rejected the frames
    pub num_bus_errors: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears the controller inputs and outputs, sets the planning cycle flag
    /// and advances the simulation time. Planner outputs are kept since the
    /// controllers run between planning cycles.
    pub fn cycle_start(&mut self, cycle_period_s: f64, plan_period_cycles: u64) {
        self.is_plan_cycle = self.num_cycles % plan_period_cycles.max(1) == 0;

        self.lat_ctrl_input = lat_ctrl::InputData::default();
        self.lat_ctrl_output = lat_ctrl::OutputData::default();
        self.lat_ctrl_status_rpt = lat_ctrl::StatusReport::default();

        self.long_ctrl_input = long_ctrl::InputData::default();
        self.long_ctrl_output = long_ctrl::OutputData::default();
        self.long_ctrl_status_rpt = long_ctrl::StatusReport::default();

        self.car_ctrl_input = car_ctrl::InputData::default();
        self.car_ctrl_output = car_ctrl::OutputData::default();
        self.car_ctrl_status_rpt = car_ctrl::StatusReport::default();

        self.sim_time_s = self.num_cycles as f64 * cycle_period_s;
    }

    /// Collect the planner outputs into the control target.
    pub fn update_target(&mut self) {
        self.target = ControlTarget {
            v_target_ms: self.long_plan_output.v_target_ms,
            v_target_future_ms: self.long_plan_output.v_target_future_ms,
            a_target_mss: self.long_plan_output.a_target_mss,
            angle_traj: self.path_plan_output.angle_traj.clone(),
            rate_des_degs: if self.path_plan_output.solution_valid {
                Some(self.path_plan_output.rate_des_degs)
            } else {
                None
            },
        };
    }

    /// Perform actions required at the end of a cycle.
    pub fn cycle_end(&mut self) {
        self.num_cycles += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::AngleTrajectory;

    #[test]
    fn test_cycle_flags() {
        let mut ds = DataStore::default();
        let mut plan_cycles = Vec::new();

        for _ in 0..12 {
            ds.cycle_start(0.01, 5);
            if ds.is_plan_cycle {
                plan_cycles.push(ds.num_cycles);
            }
            ds.cycle_end();
        }

        assert_eq!(plan_cycles, vec![0, 5, 10]);
        assert!((ds.sim_time_s - 0.11).abs() < 1e-12);
    }

    #[test]
    fn test_update_target() {
        let mut ds = DataStore::default();
        ds.long_plan_output.v_target_ms = 12.0;
        ds.path_plan_output.angle_traj = AngleTrajectory::new(vec![(0.0, 1.0), (0.05, 2.0)]);
        ds.path_plan_output.rate_des_degs = 20.0;

        ds.update_target();
        assert_eq!(ds.target.v_target_ms, 12.0);
        assert_eq!(ds.target.angle_traj.samples.len(), 2);
        assert_eq!(ds.target.rate_des_degs, None);

        ds.path_plan_output.solution_valid = true;
        ds.update_target();
        assert_eq!(ds.target.rate_des_degs, Some(20.0));
    }
}
