//! Parameters structure for CarCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::SteerLimitParams;
use can_if::checksum::ChecksumVariant;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for car control.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- FRAMES ----

    /// Frame layout file, relative to the parameters directory
    pub layout_file: String,

    /// Checksum variant used if the stock steering frame is ambiguous
    pub default_checksum: ChecksumVariant,

    /// Bus the synthesised frames are sent on
    pub bus: u8,

    /// Bus the power steering listens on
    pub mdps_bus: u8,

    /// Replace the power steering status frame with one reporting our
    /// steering request
    pub forward_mdps12: bool,

    // ---- CAMERA ----

    /// The stock camera is disconnected so its status frames must be
    /// synthesised
    pub camera_disconnected: bool,

    /// Steering message fields copied from the stock camera while it is
    /// connected
    pub keep_stock_fields: Vec<String>,

    /// Steering message fields copied from the stock camera while steering is
    /// not active
    pub inactive_stock_fields: Vec<String>,

    // ---- STEERING ----

    pub steer_limits: SteerLimitParams,

    /// Steering is not requested if the measured angle is at or beyond this.
    ///
    /// Units: degrees
    pub max_steer_angle_deg: f64,

    // ---- CLUSTER ----

    /// Report a fixed cluster speed at low speed so the stock system stays
    /// available
    pub spoof_speed: bool,

    /// Units: meters/second
    pub spoof_below_ms: f64,

    /// Cluster speed reported while spoofing, in cluster units
    pub spoof_speed_value: f64,

    /// The cluster uses a single-level lane departure warning
    pub single_level_warning: bool,

    /// Lane line probability above which a line is drawn
    pub lane_visible_prob: f64,

    // ---- LOGGING ----

    /// Minimum time between encode failure warnings.
    ///
    /// Units: seconds
    pub encode_warn_period_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        let strings = |s: &[&str]| s.iter().map(|f| f.to_string()).collect();

        Self {
            layout_file: "frames.toml".into(),
            default_checksum: ChecksumVariant::Crc8,
            bus: 0,
            mdps_bus: 0,
            forward_mdps12: false,
            camera_disconnected: false,
            keep_stock_fields: strings(&[
                "CF_Lkas_LdwsLHWarning",
                "CF_Lkas_LdwsRHWarning",
                "CF_Lkas_HbaLamp",
                "CF_Lkas_FcwBasReq",
                "CF_Lkas_HbaSysState",
                "CF_Lkas_FcwOpt",
                "CF_Lkas_HbaOpt",
                "CF_Lkas_FcwSysState",
                "CF_Lkas_FcwCollisionWarning",
                "CF_Lkas_FusionState",
                "CF_Lkas_FcwOpt_USM",
                "CF_Lkas_LdwsOpt_USM",
                "CF_Lkas_Unknown1",
                "CF_Lkas_Unknown2",
            ]),
            inactive_stock_fields: strings(&[
                "CF_Lkas_Icon",
                "CF_Lkas_LdwsSysState",
                "CF_Lkas_SysWarning",
                "CR_Lkas_StrToqReq",
                "CF_Lkas_ActToi",
            ]),
            steer_limits: SteerLimitParams::default(),
            max_steer_angle_deg: 100.0,
            spoof_speed: true,
            spoof_below_ms: 17.0,
            spoof_speed_value: 60.0,
            single_level_warning: false,
            lane_visible_prob: 0.5,
            encode_warn_period_s: 5.0,
        }
    }
}
