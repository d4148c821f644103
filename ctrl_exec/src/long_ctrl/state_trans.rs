//! Longitudinal control state machine

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::{
    BRAKE_THRESHOLD_TO_PID, STARTING_TARGET_SPEED_MS, STOPPING_EGO_SPEED_MS,
    STOPPING_TARGET_SPEED_MS,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything the state transition depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionInput {
    pub active: bool,

    /// Units: meters/second
    pub v_ego_ms: f64,

    /// Target speed, normally the target at the end of the plan.
    ///
    /// Units: meters/second
    pub v_target_ms: f64,

    /// Current PI setpoint.
    ///
    /// Units: meters/second
    pub v_pid_ms: f64,

    /// Output of the previous cycle
    pub output_gb: f64,

    pub brake_pressed: bool,

    pub cruise_standstill: bool,

    /// Tracking is only entered at or above this speed.
    ///
    /// Units: meters/second
    pub min_engage_speed_ms: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// State of longitudinal control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LongCtrlState {
    Off,

    /// Speed is tracked by the PI controller
    Tracking,

    /// Braking to a stop
    Stopping,

    /// Releasing the brake to move off
    Starting,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LongCtrlState {
    fn default() -> Self {
        LongCtrlState::Off
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the next longitudinal control state.
pub fn long_ctrl_state_trans(state: LongCtrlState, input: &TransitionInput) -> LongCtrlState {
    let stopping_condition = (input.v_ego_ms < 2.0 && input.cruise_standstill)
        || (input.v_ego_ms < STOPPING_EGO_SPEED_MS
            && ((input.v_pid_ms < STOPPING_TARGET_SPEED_MS
                && input.v_target_ms < STOPPING_TARGET_SPEED_MS)
                || input.brake_pressed));

    let starting_condition =
        input.v_target_ms > STARTING_TARGET_SPEED_MS && !input.cruise_standstill;

    if !input.active {
        return LongCtrlState::Off;
    }

    match state {
        LongCtrlState::Off if input.v_ego_ms >= input.min_engage_speed_ms => {
            LongCtrlState::Tracking
        }
        LongCtrlState::Tracking if stopping_condition => LongCtrlState::Stopping,
        LongCtrlState::Stopping if starting_condition => LongCtrlState::Starting,
        LongCtrlState::Starting if stopping_condition => LongCtrlState::Stopping,
        LongCtrlState::Starting if input.output_gb >= -BRAKE_THRESHOLD_TO_PID => {
            LongCtrlState::Tracking
        }
        s => s,
    }
}
