//! Implementations for the CarCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::HashMap;

use log::{debug, info, trace, warn};
use serde::Serialize;

// Internal
use super::{
    accel_hysteresis, apply_std_steer_torque_limits, process_hud_alert, scale_accel,
    CarCtrlError, HudInput, Params, LKAS12_PERIOD, MSG_1156_PERIOD, MSG_1191_PERIOD,
    RESUME_BURST_FRAMES, RESUME_GAP_FRAMES, SCC12_COUNTER_MODULUS,
};
use crate::vehicle::{LanePerception, LeadState, StockFrame, VehicleState};
use can_if::{
    bus::BusFrame,
    checksum::{ChecksumDetector, ChecksumVariant},
    frame::{apply_policy, LayoutTable, PolicyTable, SignalFrame, MAX_FRAME_LEN},
    msgs::{self, Buttons, Clu11, Lkas11, Mdps12, Scc12, StaticMessage},
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

/// Car control module state
pub struct CarCtrl {
    pub(crate) params: Params,

    layouts: LayoutTable,

    detector: ChecksumDetector,

    /// Steering message field sources while steering is active
    active_policy: PolicyTable,

    /// Steering message field sources while steering is inactive
    inactive_policy: PolicyTable,

    stock: StockFrames,

    /// Number of frames processed so far
    frame: u64,

    apply_steer_last: f64,

    accel_steady: f64,

    scc12_cnt: u64,

    resume_cnt: u32,
    last_resume_frame: u64,
    last_lead_distance_m: Option<f64>,

    last_good: HashMap<FrameSlot, BusFrame>,

    encode_warn: LogThrottle,

    pub(crate) report: StatusReport,
    arch_report: Archiver,
}

/// Latest decoded frame of each stock message.
#[derive(Debug, Clone, Default)]
struct StockFrames {
    lkas11: Option<SignalFrame>,
    clu11: Option<Clu11>,
    scc12: Option<Scc12>,
    mdps12: Option<Mdps12>,
}

/// Input data to car control.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Units: seconds
    pub time_s: f64,

    /// Driver has engaged the system
    pub enabled: bool,

    pub vehicle: VehicleState,

    pub lanes: LanePerception,

    pub lead: Option<LeadState>,

    /// Normalised steering command, positive left
    pub steer_cmd: f64,

    /// Normalised gas command
    pub gas: f64,

    /// Normalised brake command
    pub brake: f64,

    pub cruise_cancel: bool,

    pub steer_required: bool,

    pub left_lane_depart: bool,

    pub right_lane_depart: bool,

    /// Stock frames received since the last cycle
    pub stock_frames: Vec<StockFrame>,
}

/// Frames to send this cycle, in order.
#[derive(Debug, Clone, Default)]
pub struct OutputData {
    pub frames: Vec<BusFrame>,
}

/// Status report for CarCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub frame: u64,

    /// Steering torque requested, actuator units
    pub apply_steer: f64,

    pub steer_req: bool,

    pub lkas_active: bool,

    /// Units: meters/second^2
    pub apply_accel: f64,

    pub hud_alert: u8,

    pub lane_visible: u8,

    pub checksum_variant: ChecksumVariant,

    pub checksum_detected: bool,

    pub num_frames: usize,

    /// Frames which could not be encoded this cycle
    pub encode_errors: u32,

    /// Stock frames which could not be decoded this cycle
    pub stock_decode_errors: u32,

    /// A non-finite command was replaced with zero
    pub numeric_fault: bool,

    pub cancel_sent: bool,

    pub resume_sent: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Identifies a synthesised frame for resending the last good copy.
///
/// Button frames share a message id, so they are kept apart here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FrameSlot {
    Lkas11,
    Mdps12,
    Clu11,
    Clu11Cancel,
    Clu11Resume,
    Scc12,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CarCtrl {
    fn default() -> Self {
        Self::build(Params::default(), LayoutTable::default())
    }
}

impl State for CarCtrl {
    type InitData = &'static str;
    type InitError = CarCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = CarCtrlError;

    /// Initialise the CarCtrl module.
    ///
    /// Expected init data is the path to the parameter file. The frame
    /// layouts are loaded from the file the parameters name, and must be
    /// valid.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        let params: Params = params::load(init_data)?;
        let layouts: LayoutTable = params::load(&params.layout_file)?;

        *self = Self::new(params, layouts)?;

        info!(
            "CarCtrl loaded {} frame layouts from {}",
            self.layouts.messages.len(),
            self.params.layout_file
        );

        self.arch_report = Archiver::from_path(session, "car_ctrl/status_report.csv")?;

        Ok(())
    }

    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();
        self.report.frame = self.frame;

        self.ingest(&input_data.stock_frames);

        let vehicle = &input_data.vehicle;
        let time_s = input_data.time_s;

        // ---- ACCELERATION ----

        let accel_norm = self.finite_or_zero(input_data.gas - input_data.brake);
        let (accel, steady) = accel_hysteresis(accel_norm, self.accel_steady);
        self.accel_steady = steady;
        let apply_accel = scale_accel(accel);

        // ---- STEERING ----

        let steer_cmd = self.finite_or_zero(input_data.steer_cmd);
        let lkas_active = input_data.enabled
            && vehicle.steer_angle_deg.abs() < self.params.max_steer_angle_deg;

        let apply_steer = if lkas_active {
            apply_std_steer_torque_limits(
                steer_cmd * self.params.steer_limits.steer_max,
                self.apply_steer_last,
                vehicle.steer_torque_driver,
                &self.params.steer_limits,
            )
        } else {
            0.0
        };
        let steer_req = apply_steer != 0.0;
        self.apply_steer_last = apply_steer;

        let hud = process_hud_alert(&HudInput {
            enabled: input_data.enabled,
            steer_required: input_data.steer_required,
            left_line: input_data.lanes.l_prob > self.params.lane_visible_prob,
            right_line: input_data.lanes.r_prob > self.params.lane_visible_prob,
            left_lane_depart: input_data.left_lane_depart,
            right_lane_depart: input_data.right_lane_depart,
            single_level_warning: self.params.single_level_warning,
        });

        trace!(
            "CarCtrl frame {}: steer {} (req {}), accel {:.3}",
            self.frame,
            apply_steer,
            steer_req,
            apply_accel
        );

        // ---- FRAMES ----

        let mut frames = Vec::new();
        let cnt16 = (self.frame % 16) as f64;
        self.scc12_cnt %= SCC12_COUNTER_MODULUS;

        if self.params.camera_disconnected {
            let statics = [
                (LKAS12_PERIOD, msgs::LKAS12),
                (MSG_1191_PERIOD, msgs::MSG_1191),
                (MSG_1156_PERIOD, msgs::MSG_1156),
            ];
            for (period, msg) in statics.iter() {
                if self.frame % period == 0 {
                    frames.push(self.static_frame(msg));
                }
            }
        }

        // Steering command
        let lkas11 = Lkas11 {
            icon: if lkas_active { 2.0 } else { 0.0 },
            ldws_sys_state: if steer_req { 3.0 } else { f64::from(hud.lane_visible) },
            sys_warning: f64::from(hud.hud_alert),
            ldws_lh_warning: f64::from(hud.left_lane_warning),
            ldws_rh_warning: f64::from(hud.right_lane_warning),
            str_toq_req: apply_steer,
            act_toi: if steer_req { 1.0 } else { 0.0 },
            hba_sys_state: 1.0,
            hba_opt: 3.0,
            msg_count: cnt16,
            fcw_opt_usm: if input_data.enabled { 2.0 } else { 1.0 },
            ldws_opt_usm: 3.0,
            ..Default::default()
        };
        let policy = if lkas_active {
            &self.active_policy
        } else {
            &self.inactive_policy
        };
        let lkas11 = apply_policy(&lkas11.to_signals(), self.stock.lkas11.as_ref(), policy);
        self.push_encoded(&mut frames, FrameSlot::Lkas11, &lkas11, self.params.bus, time_s);

        // Power steering status, reporting our torque request as active
        if self.params.forward_mdps12 {
            if let Some(stock) = self.stock.mdps12 {
                let mdps12 = Mdps12 {
                    toi_active: lkas11.get("CF_Lkas_ActToi").unwrap_or(0.0),
                    msg_count2: (self.frame % 256) as f64,
                    chksum2: 0.0,
                    toi_flt: 0.0,
                    ..stock
                };
                self.push_encoded(
                    &mut frames,
                    FrameSlot::Mdps12,
                    &mdps12.to_signals(),
                    self.params.mdps_bus,
                    time_s,
                );
            }
        }

        // Cluster
        let clu_stock = self.stock.clu11.unwrap_or_default();
        let speed = if self.params.spoof_speed && vehicle.v_ego_ms < self.params.spoof_below_ms {
            self.params.spoof_speed_value
        } else {
            clu_stock.vanz
        };
        let clu11 = |button: f64| {
            Clu11 {
                cruise_sw_state: button,
                vanz: speed,
                alive_cnt1: cnt16,
                ..clu_stock
            }
            .to_signals()
        };
        self.push_encoded(&mut frames, FrameSlot::Clu11, &clu11(Buttons::NONE), self.params.bus, time_s);

        // Cruise acceleration request
        if self.frame % 2 == 1 {
            let scc12 = Scc12 {
                a_req_max: apply_accel,
                a_req_min: apply_accel,
                acc_mode: if input_data.enabled { 1.0 } else { 0.0 },
                vsm_alive: self.scc12_cnt as f64,
                vsm_chksum: 0.0,
                ..self.stock.scc12.unwrap_or_default()
            };
            self.push_encoded(&mut frames, FrameSlot::Scc12, &scc12.to_signals(), self.params.bus, time_s);
            self.scc12_cnt += 1;
        }

        if input_data.cruise_cancel {
            self.push_encoded(
                &mut frames,
                FrameSlot::Clu11Cancel,
                &clu11(Buttons::CANCEL),
                self.params.bus,
                time_s,
            );
            self.report.cancel_sent = true;
        }

        if self.resume_due(vehicle.cruise_standstill, input_data.lead) {
            self.push_encoded(
                &mut frames,
                FrameSlot::Clu11Resume,
                &clu11(Buttons::RES_ACCEL),
                self.params.bus,
                time_s,
            );
            self.report.resume_sent = true;
        }

        // ---- REPORT ----

        self.report.apply_steer = apply_steer;
        self.report.steer_req = steer_req;
        self.report.lkas_active = lkas_active;
        self.report.apply_accel = apply_accel;
        self.report.hud_alert = hud.hud_alert;
        self.report.lane_visible = hud.lane_visible;
        self.report.checksum_variant = self.detector.variant();
        self.report.checksum_detected = self.detector.is_detected();
        self.report.num_frames = frames.len();

        self.frame += 1;

        Ok((OutputData { frames }, self.report))
    }
}

impl Archived for CarCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)
    }
}

impl CarCtrl {
    /// Create a new instance, checking the frame layouts.
    pub fn new(params: Params, layouts: LayoutTable) -> Result<Self, CarCtrlError> {
        layouts.validate()?;
        Ok(Self::build(params, layouts))
    }

    fn build(params: Params, layouts: LayoutTable) -> Self {
        let active_policy = if params.camera_disconnected {
            PolicyTable::new()
        } else {
            PolicyTable::with_stock(&params.keep_stock_fields)
        };
        let mut inactive_policy = active_policy.clone();
        inactive_policy.extend_stock(&params.inactive_stock_fields);

        Self {
            detector: ChecksumDetector::new(params.default_checksum),
            encode_warn: LogThrottle::new(params.encode_warn_period_s),
            params,
            layouts,
            active_policy,
            inactive_policy,
            stock: StockFrames::default(),
            frame: 0,
            apply_steer_last: 0.0,
            accel_steady: 0.0,
            scc12_cnt: 0,
            resume_cnt: 0,
            last_resume_frame: 0,
            last_lead_distance_m: None,
            last_good: HashMap::new(),
            report: StatusReport::default(),
            arch_report: Archiver::default(),
        }
    }

    /// The frame layouts in use.
    pub fn layouts(&self) -> &LayoutTable {
        &self.layouts
    }

    /// Clear the per-drive state. The detected checksum variant is kept.
    pub fn reset(&mut self) {
        self.stock = StockFrames::default();
        self.frame = 0;
        self.apply_steer_last = 0.0;
        self.accel_steady = 0.0;
        self.scc12_cnt = 0;
        self.resume_cnt = 0;
        self.last_resume_frame = 0;
        self.last_lead_distance_m = None;
        self.last_good.clear();
    }

    /// Decode the stock frames, keeping the latest of each message and
    /// detecting the checksum variant from the first steering frame.
    fn ingest(&mut self, stock_frames: &[StockFrame]) {
        for sf in stock_frames {
            match sf.id {
                Lkas11::ID | Clu11::ID | Scc12::ID | Mdps12::ID => (),
                _ => {
                    trace!("Ignoring stock frame {}", sf.id);
                    continue;
                }
            }

            let decoded = match self.layouts.decode(sf.id, &sf.data) {
                Ok(d) => d,
                Err(e) => {
                    debug!("Could not decode stock frame: {}", e);
                    self.report.stock_decode_errors += 1;
                    continue;
                }
            };

            let stored = match sf.id {
                Lkas11::ID => {
                    if !self.detector.is_detected() && sf.data.len() >= MAX_FRAME_LEN {
                        let mut bytes = [0u8; MAX_FRAME_LEN];
                        bytes.copy_from_slice(&sf.data[..MAX_FRAME_LEN]);
                        self.detector.observe(&bytes);
                    }
                    self.stock.lkas11 = Some(decoded);
                    Ok(())
                }
                Clu11::ID => Clu11::from_signals(&decoded).map(|r| self.stock.clu11 = Some(r)),
                Scc12::ID => Scc12::from_signals(&decoded).map(|r| self.stock.scc12 = Some(r)),
                _ => Mdps12::from_signals(&decoded).map(|r| self.stock.mdps12 = Some(r)),
            };

            if let Err(e) = stored {
                debug!("Stock frame does not match its record: {}", e);
                self.report.stock_decode_errors += 1;
            }
        }
    }

    /// Returns true if a resume button frame should be sent this cycle.
    ///
    /// While cruise holds the car stopped the lead distance is remembered.
    /// Once the lead pulls away a burst of resume frames is sent, then a gap
    /// before the next burst.
    fn resume_due(&mut self, stopped: bool, lead: Option<LeadState>) -> bool {
        let lead_distance_m = lead.map(|l| l.x_rel_m).unwrap_or(0.0);

        if !stopped {
            self.last_lead_distance_m = None;
            return false;
        }

        match self.last_lead_distance_m {
            Some(last) if last > 0.0 => {
                if lead_distance_m > last
                    && self.frame.saturating_sub(self.last_resume_frame) > RESUME_GAP_FRAMES
                {
                    self.resume_cnt += 1;
                    if self.resume_cnt >= RESUME_BURST_FRAMES {
                        self.last_resume_frame = self.frame;
                        self.resume_cnt = 0;
                    }
                    true
                } else {
                    false
                }
            }
            _ => {
                self.last_lead_distance_m = Some(lead_distance_m);
                self.resume_cnt = 0;
                false
            }
        }
    }

    /// Encode a frame and add it to the output, or on failure add the last
    /// good frame from the same slot.
    fn push_encoded(
        &mut self,
        frames: &mut Vec<BusFrame>,
        slot: FrameSlot,
        signals: &SignalFrame,
        bus: u8,
        time_s: f64,
    ) {
        match self.layouts.encode(signals, self.detector.variant()) {
            Ok(data) => {
                let len = self
                    .layouts
                    .get(signals.id)
                    .map(|l| l.len)
                    .unwrap_or(MAX_FRAME_LEN);
                let frame = BusFrame::new(signals.id, bus, &data[..len]);
                self.last_good.insert(slot, frame);
                frames.push(frame);
            }
            Err(e) => {
                self.report.encode_errors += 1;
                if self.encode_warn.ready(time_s) {
                    warn!(
                        "Suppressed frame {:?}: {} ({} warnings suppressed)",
                        slot,
                        e,
                        self.encode_warn.take_suppressed()
                    );
                }
                if let Some(f) = self.last_good.get(&slot) {
                    frames.push(*f);
                }
            }
        }
    }

    fn static_frame(&self, msg: &StaticMessage) -> BusFrame {
        BusFrame::new(msg.id, self.params.bus, msg.data)
    }

    fn finite_or_zero(&mut self, value: f64) -> f64 {
        if value.is_finite() {
            value
        } else {
            self.report.numeric_fault = true;
            0.0
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use can_if::checksum;

    fn layouts() -> LayoutTable {
        params::parse(include_str!("../../../params/frames.toml")).unwrap()
    }

    fn car_ctrl(params: Params) -> CarCtrl {
        CarCtrl::new(params, layouts()).unwrap()
    }

    fn engaged() -> InputData {
        InputData {
            enabled: true,
            vehicle: VehicleState {
                v_ego_ms: 20.0,
                ..Default::default()
            },
            steer_cmd: 0.5,
            ..Default::default()
        }
    }

    fn decode(ctrl: &CarCtrl, frame: &BusFrame) -> SignalFrame {
        ctrl.layouts().decode(frame.id, frame.payload()).unwrap()
    }

    fn find<'a>(frames: &'a [BusFrame], id: u32) -> impl Iterator<Item = &'a BusFrame> {
        frames.iter().filter(move |f| f.id == id)
    }

    #[test]
    fn test_layouts_valid() {
        let t = layouts();
        assert_eq!(t.validate(), Ok(()));
        for id in [Lkas11::ID, Clu11::ID, Mdps12::ID, Scc12::ID].iter() {
            assert!(t.get(*id).is_some());
        }
    }

    #[test]
    fn test_lkas11_counter_checksum_and_ramp() {
        let mut ctrl = car_ctrl(Params::default());

        for i in 0..20u64 {
            let (out, report) = ctrl.proc(&engaged()).unwrap();
            let lkas: Vec<_> = find(&out.frames, Lkas11::ID).collect();
            assert_eq!(lkas.len(), 1);

            let frame = lkas[0];
            assert_eq!(frame.len, 8);
            assert_eq!(
                ctrl.layouts().verify(frame.id, frame.payload(), ChecksumVariant::Crc8),
                Ok(true)
            );

            let sig = decode(&ctrl, frame);
            assert_eq!(sig.get("CF_Lkas_MsgCount"), Some((i % 16) as f64));
            assert_eq!(sig.get("CR_Lkas_StrToqReq"), Some(3.0 * (i + 1) as f64));
            assert_eq!(sig.get("CF_Lkas_ActToi"), Some(1.0));
            assert!(report.steer_req);
        }
    }

    #[test]
    fn test_large_angle_disables_steering() {
        let mut ctrl = car_ctrl(Params::default());
        let mut input = engaged();
        input.vehicle.steer_angle_deg = -120.0;

        let (out, report) = ctrl.proc(&input).unwrap();
        assert!(!report.lkas_active);
        assert_eq!(report.apply_steer, 0.0);

        let lkas = find(&out.frames, Lkas11::ID).next().unwrap();
        let sig = decode(&ctrl, lkas);
        assert_eq!(sig.get("CR_Lkas_StrToqReq"), Some(0.0));
        assert_eq!(sig.get("CF_Lkas_ActToi"), Some(0.0));
    }

    #[test]
    fn test_non_finite_command() {
        let mut ctrl = car_ctrl(Params::default());
        let mut input = engaged();
        input.steer_cmd = std::f64::NAN;
        input.gas = std::f64::INFINITY;

        let (out, report) = ctrl.proc(&input).unwrap();
        assert!(report.numeric_fault);
        assert_eq!(report.apply_steer, 0.0);
        assert_eq!(report.apply_accel, 0.0);
        assert_eq!(report.encode_errors, 0);
        assert!(find(&out.frames, Lkas11::ID).next().is_some());
    }

    #[test]
    fn test_checksum_detection() {
        let t = layouts();
        let stock = Lkas11 {
            icon: 1.0,
            ldws_sys_state: 2.0,
            str_toq_req: 17.0,
            msg_count: 5.0,
            fcw_opt_usm: 2.0,
            ldws_opt_usm: 4.0,
            ..Default::default()
        };
        let bytes = t.encode(&stock.to_signals(), ChecksumVariant::Sum7).unwrap();

        // The candidates must disagree on this frame for detection to be
        // unambiguous
        let crc8 = checksum::compute(ChecksumVariant::Crc8, &bytes);
        let sum6 = checksum::compute(ChecksumVariant::Sum6, &bytes);
        let sum7 = checksum::compute(ChecksumVariant::Sum7, &bytes);
        assert_ne!(crc8, sum6);
        assert_ne!(crc8, sum7);
        assert_ne!(sum6, sum7);
        assert_eq!(bytes[checksum::CHECKSUM_SLOT], sum7);
        assert_eq!(
            checksum::detect(&bytes, bytes[checksum::CHECKSUM_SLOT]),
            Ok(ChecksumVariant::Sum7)
        );
        let expected = ChecksumVariant::Sum7;

        let mut ctrl = car_ctrl(Params::default());
        let mut input = engaged();
        input.stock_frames = vec![StockFrame {
            id: Lkas11::ID,
            data: bytes.to_vec(),
        }];

        let (out, report) = ctrl.proc(&input).unwrap();
        assert!(report.checksum_detected);
        assert_eq!(report.checksum_variant, expected);

        let lkas = find(&out.frames, Lkas11::ID).next().unwrap();
        assert_eq!(ctrl.layouts().verify(lkas.id, lkas.payload(), expected), Ok(true));
    }

    #[test]
    fn test_keep_stock_policy() {
        let t = layouts();
        let stock = Lkas11 {
            hba_opt: 1.0,
            icon: 1.0,
            ..Default::default()
        };
        let bytes = t.encode(&stock.to_signals(), ChecksumVariant::Crc8).unwrap();
        let stock_frame = StockFrame {
            id: Lkas11::ID,
            data: bytes.to_vec(),
        };

        // Camera connected: stock fields pass through, steering fields are
        // computed while active
        let mut ctrl = car_ctrl(Params::default());
        let mut input = engaged();
        input.stock_frames = vec![stock_frame.clone()];
        let (out, _) = ctrl.proc(&input).unwrap();
        let sig = decode(&ctrl, find(&out.frames, Lkas11::ID).next().unwrap());
        assert_eq!(sig.get("CF_Lkas_HbaOpt"), Some(1.0));
        assert_eq!(sig.get("CF_Lkas_Icon"), Some(2.0));

        // Inactive: the steering fields come from stock too
        input.enabled = false;
        let (out, _) = ctrl.proc(&input).unwrap();
        let sig = decode(&ctrl, find(&out.frames, Lkas11::ID).next().unwrap());
        assert_eq!(sig.get("CF_Lkas_Icon"), Some(1.0));

        // Camera disconnected: everything computed and statics sent
        let mut ctrl = car_ctrl(Params {
            camera_disconnected: true,
            ..Default::default()
        });
        input.enabled = true;
        let (out, _) = ctrl.proc(&input).unwrap();
        let sig = decode(&ctrl, find(&out.frames, Lkas11::ID).next().unwrap());
        assert_eq!(sig.get("CF_Lkas_HbaOpt"), Some(3.0));
        for msg in [msgs::LKAS12, msgs::MSG_1191, msgs::MSG_1156].iter() {
            let f = find(&out.frames, msg.id).next().unwrap();
            assert_eq!(f.payload(), msg.data);
        }
    }

    #[test]
    fn test_static_periods() {
        let mut ctrl = car_ctrl(Params {
            camera_disconnected: true,
            ..Default::default()
        });

        let mut counts = HashMap::new();
        for _ in 0..100 {
            let (out, _) = ctrl.proc(&engaged()).unwrap();
            for f in out.frames.iter() {
                *counts.entry(f.id).or_insert(0) += 1;
            }
        }

        assert_eq!(counts[&msgs::LKAS12.id], 10);
        assert_eq!(counts[&msgs::MSG_1191.id], 2);
        assert_eq!(counts[&msgs::MSG_1156.id], 15);
        assert_eq!(counts[&Lkas11::ID], 100);
    }

    #[test]
    fn test_scc12_on_odd_frames() {
        let mut ctrl = car_ctrl(Params::default());
        let mut input = engaged();
        input.gas = 0.5;

        let mut alive = Vec::new();
        for i in 0..6 {
            let (out, report) = ctrl.proc(&input).unwrap();
            let scc: Vec<_> = find(&out.frames, Scc12::ID).collect();

            if i % 2 == 1 {
                assert_eq!(scc.len(), 1);
                let sig = decode(&ctrl, scc[0]);
                alive.push(sig.get("CR_VSM_Alive").unwrap());
                assert!((sig.get("aReqMax").unwrap() - report.apply_accel).abs() < 0.011);
                assert_eq!(sig.get("ACCMode"), Some(1.0));
            } else {
                assert!(scc.is_empty());
            }
        }

        assert_eq!(alive, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_cancel_and_speed_spoof() {
        let mut ctrl = car_ctrl(Params::default());
        let mut input = engaged();
        input.cruise_cancel = true;
        input.vehicle.v_ego_ms = 5.0;

        let (out, report) = ctrl.proc(&input).unwrap();
        assert!(report.cancel_sent);

        let clu: Vec<_> = find(&out.frames, Clu11::ID)
            .map(|f| decode(&ctrl, f))
            .collect();
        assert_eq!(clu.len(), 2);
        assert_eq!(clu[0].get("CF_Clu_CruiseSwState"), Some(Buttons::NONE));
        assert_eq!(clu[1].get("CF_Clu_CruiseSwState"), Some(Buttons::CANCEL));
        assert_eq!(clu[1].get("CF_Clu_Vanz"), Some(60.0));
    }

    #[test]
    fn test_resume_spam() {
        let mut ctrl = car_ctrl(Params::default());
        let mut input = engaged();
        input.vehicle.cruise_standstill = true;
        input.lead = Some(LeadState {
            x_rel_m: 10.0,
            ..Default::default()
        });

        let mut resume_frames = Vec::new();
        for i in 0..=20 {
            if i == 1 {
                input.lead = Some(LeadState {
                    x_rel_m: 12.0,
                    ..Default::default()
                });
            }

            let (out, report) = ctrl.proc(&input).unwrap();
            let resumed = find(&out.frames, Clu11::ID)
                .any(|f| decode(&ctrl, f).get("CF_Clu_CruiseSwState") == Some(Buttons::RES_ACCEL));
            assert_eq!(resumed, report.resume_sent);
            if resumed {
                resume_frames.push(i);
            }
        }

        assert_eq!(resume_frames, vec![6, 7, 8, 9, 10, 11, 17, 18, 19, 20]);

        // Moving off clears the remembered lead distance
        input.vehicle.cruise_standstill = false;
        let (_, report) = ctrl.proc(&input).unwrap();
        assert!(!report.resume_sent);
        assert!(ctrl.last_lead_distance_m.is_none());
    }

    #[test]
    fn test_mdps12_forwarding() {
        let t = layouts();
        let stock = Mdps12 {
            str_tq: -12.0,
            out_tq: 5.0,
            ..Default::default()
        };
        let bytes = t.encode(&stock.to_signals(), ChecksumVariant::None).unwrap();

        let mut ctrl = car_ctrl(Params {
            forward_mdps12: true,
            mdps_bus: 1,
            ..Default::default()
        });
        let mut input = engaged();
        input.stock_frames = vec![StockFrame {
            id: Mdps12::ID,
            data: bytes.to_vec(),
        }];

        let (out, _) = ctrl.proc(&input).unwrap();
        let mdps = find(&out.frames, Mdps12::ID).next().unwrap();
        assert_eq!(mdps.bus, 1);
        assert_eq!(
            ctrl.layouts().verify(mdps.id, mdps.payload(), ChecksumVariant::None),
            Ok(true)
        );

        let sig = decode(&ctrl, mdps);
        assert_eq!(sig.get("CF_Mdps_ToiActive"), Some(1.0));
        assert_eq!(sig.get("CR_Mdps_StrTq"), Some(-12.0));
    }

    #[test]
    fn test_encode_error_resends_last_good() {
        let mut ctrl = car_ctrl(Params {
            spoof_speed_value: 300.0,
            ..Default::default()
        });

        // Fast enough not to spoof, so the cluster frame encodes
        let mut input = engaged();
        let (out, report) = ctrl.proc(&input).unwrap();
        assert_eq!(report.encode_errors, 0);
        let good = *find(&out.frames, Clu11::ID).next().unwrap();

        // The spoofed speed does not fit the signal
        input.vehicle.v_ego_ms = 5.0;
        let (out, report) = ctrl.proc(&input).unwrap();
        assert_eq!(report.encode_errors, 1);
        assert_eq!(find(&out.frames, Clu11::ID).next(), Some(&good));
    }

    #[test]
    fn test_bad_stock_frame_counted() {
        let mut ctrl = car_ctrl(Params::default());
        let mut input = engaged();
        input.stock_frames = vec![
            StockFrame {
                id: Lkas11::ID,
                data: vec![0; 3],
            },
            StockFrame {
                id: 42,
                data: vec![0; 8],
            },
        ];

        let (_, report) = ctrl.proc(&input).unwrap();
        assert_eq!(report.stock_decode_errors, 1);
        assert!(!report.checksum_detected);
    }
}
