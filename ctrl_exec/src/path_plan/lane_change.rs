//! Lane change state machine and desire arbitration

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use serde::{Deserialize, Serialize};

use super::DT_PLAN_S;
use crate::vehicle::{LaneChangeDirection, VehicleState};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lane change probability above which a started change is finishing.
const FINISHING_PROB: f64 = 0.5;

/// Lane change probability below which a finishing change is complete.
const FINISHED_PROB: f64 = 0.2;

/// Once a change has run for this long, steering input aborts it.
///
/// Units: seconds
const OVERRIDE_AFTER_S: f64 = 1.0;

/// Window in the pre lane change state in which an automatic change starts.
///
/// Units: seconds
const AUTO_LCA_WINDOW_S: (f64, f64) = (2.0, 3.0);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Configuration of the lane change arbiter.
#[derive(Debug, Clone, Deserialize)]
pub struct LaneChangeParams {
    /// Start a lane change automatically after signalling for a while.
    pub auto_lca: bool,

    /// Below this speed no lane change may be prepared.
    ///
    /// Units: meters/second
    pub min_speed_ms: f64,

    /// A lane change lasting longer than this returns to preparation.
    ///
    /// Units: seconds
    pub timeout_s: f64,
}

/// Tracks the lane change state across planning cycles.
#[derive(Debug, Clone)]
pub struct LaneChangeArbiter {
    params: LaneChangeParams,

    state: LaneChangeState,
    direction: LaneChangeDirection,

    /// Time spent starting or finishing the current change.
    ///
    /// Units: seconds
    timer_s: f64,

    /// Time since the arbiter left the off state.
    ///
    /// Units: seconds
    pre_timer_s: f64,

    prev_one_blinker: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LaneChangeState {
    Off,
    PreLaneChange,
    LaneChangeStarting,
    LaneChangeFinishing,
}

/// Intent passed to the perception model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Desire {
    None,
    LaneChangeLeft,
    LaneChangeRight,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LaneChangeParams {
    fn default() -> Self {
        Self {
            auto_lca: false,
            min_speed_ms: 20.1168,
            timeout_s: 10.0,
        }
    }
}

impl Default for LaneChangeState {
    fn default() -> Self {
        LaneChangeState::Off
    }
}

impl Default for Desire {
    fn default() -> Self {
        Desire::None
    }
}

impl LaneChangeArbiter {
    pub fn new(params: LaneChangeParams) -> Self {
        Self {
            params,
            state: LaneChangeState::Off,
            direction: LaneChangeDirection::None,
            timer_s: 0.0,
            pre_timer_s: 0.0,
            prev_one_blinker: false,
        }
    }

    pub fn reset(&mut self) {
        self.state = LaneChangeState::Off;
        self.direction = LaneChangeDirection::None;
        self.timer_s = 0.0;
        self.pre_timer_s = 0.0;
        self.prev_one_blinker = false;
    }

    pub fn state(&self) -> LaneChangeState {
        self.state
    }

    pub fn direction(&self) -> LaneChangeDirection {
        self.direction
    }

    /// Advance the arbiter by one planning cycle and return the desire.
    pub fn update(
        &mut self,
        active: bool,
        vehicle: &VehicleState,
        lane_change_prob: f64,
    ) -> Desire {
        let prev_state = self.state;
        let one_blinker = vehicle.one_blinker();

        if !active {
            self.state = LaneChangeState::Off;
            self.direction = LaneChangeDirection::None;
        }
        else {
            self.direction = vehicle.blinker_direction();

            if self.timer_s > self.params.timeout_s {
                self.state = LaneChangeState::PreLaneChange;
            }
            else {
                self.state = self.transition(vehicle, one_blinker, lane_change_prob);
            }

            if vehicle.v_ego_ms < self.params.min_speed_ms
                && self.state == LaneChangeState::PreLaneChange
            {
                self.state = LaneChangeState::Off;
            }
        }

        match self.state {
            LaneChangeState::Off | LaneChangeState::PreLaneChange => self.timer_s = 0.0,
            _ => {
                self.timer_s += DT_PLAN_S;
                if self.timer_s > OVERRIDE_AFTER_S && vehicle.steer_pressed {
                    self.state = LaneChangeState::PreLaneChange;
                }
            }
        }

        if self.state == LaneChangeState::Off {
            self.pre_timer_s = 0.0;
        }
        else {
            self.pre_timer_s += DT_PLAN_S;
        }

        self.prev_one_blinker = one_blinker;

        if self.state != prev_state {
            debug!(
                "Lane change {:?} -> {:?} ({:?})",
                prev_state, self.state, self.direction
            );
        }

        desire(self.direction, self.state)
    }

    fn transition(
        &self,
        vehicle: &VehicleState,
        one_blinker: bool,
        lane_change_prob: f64,
    ) -> LaneChangeState {
        let mut torque_applied = vehicle.steer_pressed
            && match self.direction {
                LaneChangeDirection::Left => vehicle.steer_torque_driver > 0.0,
                _ => vehicle.steer_torque_driver < 0.0,
            };

        if self.params.auto_lca
            && self.state == LaneChangeState::PreLaneChange
            && self.pre_timer_s > AUTO_LCA_WINDOW_S.0
            && self.pre_timer_s < AUTO_LCA_WINDOW_S.1
        {
            torque_applied = true;
        }

        match self.state {
            LaneChangeState::Off if one_blinker && !self.prev_one_blinker => {
                LaneChangeState::PreLaneChange
            }
            LaneChangeState::PreLaneChange if !one_blinker => LaneChangeState::Off,
            LaneChangeState::PreLaneChange if torque_applied => {
                LaneChangeState::LaneChangeStarting
            }
            LaneChangeState::LaneChangeStarting if lane_change_prob > FINISHING_PROB => {
                LaneChangeState::LaneChangeFinishing
            }
            LaneChangeState::LaneChangeFinishing if lane_change_prob < FINISHED_PROB => {
                LaneChangeState::PreLaneChange
            }
            s => s,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Desire for a lane change direction and state.
pub fn desire(direction: LaneChangeDirection, state: LaneChangeState) -> Desire {
    match (direction, state) {
        (
            LaneChangeDirection::Left,
            LaneChangeState::LaneChangeStarting | LaneChangeState::LaneChangeFinishing,
        ) => Desire::LaneChangeLeft,
        (
            LaneChangeDirection::Right,
            LaneChangeState::LaneChangeStarting | LaneChangeState::LaneChangeFinishing,
        ) => Desire::LaneChangeRight,
        _ => Desire::None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::BlinkerState;

    fn highway() -> VehicleState {
        VehicleState {
            v_ego_ms: 30.0,
            ..Default::default()
        }
    }

    fn left_on(v: &mut VehicleState) {
        v.left_blinker = BlinkerState { on: true, flash: false };
    }

    #[test]
    fn test_blinker_on_off() {
        let mut arb = LaneChangeArbiter::new(LaneChangeParams::default());
        let mut v = highway();

        assert_eq!(arb.update(true, &v, 0.0), Desire::None);
        assert_eq!(arb.state(), LaneChangeState::Off);

        left_on(&mut v);
        arb.update(true, &v, 0.0);
        assert_eq!(arb.state(), LaneChangeState::PreLaneChange);
        assert_eq!(arb.direction(), LaneChangeDirection::Left);

        v.left_blinker = BlinkerState::default();
        arb.update(true, &v, 0.0);
        assert_eq!(arb.state(), LaneChangeState::Off);
    }

    #[test]
    fn test_torque_starts_change() {
        let mut arb = LaneChangeArbiter::new(LaneChangeParams::default());
        let mut v = highway();
        left_on(&mut v);
        arb.update(true, &v, 0.0);

        // Torque against the blinker does nothing
        v.steer_pressed = true;
        v.steer_torque_driver = -50.0;
        arb.update(true, &v, 0.0);
        assert_eq!(arb.state(), LaneChangeState::PreLaneChange);

        v.steer_torque_driver = 50.0;
        assert_eq!(arb.update(true, &v, 0.0), Desire::LaneChangeLeft);
        assert_eq!(arb.state(), LaneChangeState::LaneChangeStarting);

        v.steer_pressed = false;
        arb.update(true, &v, 0.6);
        assert_eq!(arb.state(), LaneChangeState::LaneChangeFinishing);

        assert_eq!(arb.update(true, &v, 0.1), Desire::None);
        assert_eq!(arb.state(), LaneChangeState::PreLaneChange);
    }

    #[test]
    fn test_low_speed_stays_off() {
        let mut arb = LaneChangeArbiter::new(LaneChangeParams::default());
        let mut v = highway();
        v.v_ego_ms = 20.0;
        left_on(&mut v);
        v.steer_pressed = true;
        v.steer_torque_driver = 50.0;

        for _ in 0..10 {
            assert_eq!(arb.update(true, &v, 0.0), Desire::None);
            assert_eq!(arb.state(), LaneChangeState::Off);
        }
    }

    #[test]
    fn test_inactive_is_off() {
        let mut arb = LaneChangeArbiter::new(LaneChangeParams::default());
        let mut v = highway();
        left_on(&mut v);
        arb.update(true, &v, 0.0);

        arb.update(false, &v, 0.0);
        assert_eq!(arb.state(), LaneChangeState::Off);
        assert_eq!(arb.direction(), LaneChangeDirection::None);
    }

    #[test]
    fn test_timeout_returns_to_pre() {
        let mut arb = LaneChangeArbiter::new(LaneChangeParams::default());
        let mut v = highway();
        v.right_blinker = BlinkerState { on: false, flash: true };
        arb.update(true, &v, 0.0);

        v.steer_pressed = true;
        v.steer_torque_driver = -50.0;
        arb.update(true, &v, 0.0);
        assert_eq!(arb.state(), LaneChangeState::LaneChangeStarting);

        // Stuck in starting with no progress and hands off
        v.steer_pressed = false;
        let mut cycles = 0;
        while arb.state() == LaneChangeState::LaneChangeStarting {
            arb.update(true, &v, 0.0);
            cycles += 1;
            assert!(cycles < 250);
        }
        assert_eq!(arb.state(), LaneChangeState::PreLaneChange);
        assert!(cycles >= 200);
    }

    #[test]
    fn test_auto_lca() {
        let mut arb = LaneChangeArbiter::new(LaneChangeParams {
            auto_lca: true,
            ..Default::default()
        });
        let mut v = highway();
        left_on(&mut v);

        let mut started_at = None;
        for k in 0..80 {
            arb.update(true, &v, 0.0);
            if arb.state() == LaneChangeState::LaneChangeStarting {
                started_at = Some(k);
                break;
            }
        }

        // Starts a little after two seconds of signalling
        let k = started_at.unwrap();
        assert!(k >= 40 && k <= 60, "started at cycle {}", k);
    }

    #[test]
    fn test_desire_table() {
        use LaneChangeDirection as D;
        use LaneChangeState as S;

        assert_eq!(desire(D::Left, S::LaneChangeFinishing), Desire::LaneChangeLeft);
        assert_eq!(desire(D::Right, S::LaneChangeStarting), Desire::LaneChangeRight);
        assert_eq!(desire(D::Left, S::PreLaneChange), Desire::None);
        assert_eq!(desire(D::None, S::LaneChangeStarting), Desire::None);
    }
}
