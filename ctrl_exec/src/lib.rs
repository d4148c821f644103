//! # Drive control library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to
//! access the control modules used by the executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Vehicle state snapshots and control targets shared between modules
pub mod vehicle;

/// Proportional-integral controller with feed-forward and anti-windup
pub mod pid;

/// Lateral control - tracks the desired steering angle trajectory
pub mod lat_ctrl;

/// Longitudinal control - state machine and speed loop producing gas/brake
pub mod long_ctrl;

/// Solver error shared by the planners
pub mod solver;

/// Path planning - lane change arbitration and the lateral solver
pub mod path_plan;

/// Longitudinal planning - speed targets from the longitudinal solver
pub mod long_plan;

/// Car control - turns actuator commands into CAN frames
pub mod car_ctrl;

/// Bus transport writing frames to the session archive
pub mod archive_bus;

/// Global data store for the executable
pub mod data_store;
