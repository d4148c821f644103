//! # Typed message records
//!
//! Fixed-schema records for the messages the controller reads and writes.
//! Each record converts to and from a `SignalFrame` keyed by the signal names
//! used in the layout table, so call sites never deal in raw strings.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::frame::{DecodeError, SignalFrame};

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

/// Define a message record with one `f64` field per signal.
macro_rules! message_record {
    (
        $(#[$meta:meta])*
        $name:ident = $id:expr;
        $( $(#[$fmeta:meta])* $field:ident => $signal:literal ),* $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: f64, )*
        }

        impl $name {
            /// Message id
            pub const ID: u32 = $id;

            /// Signal names in record order
            pub const SIGNALS: &'static [&'static str] = &[$( $signal ),*];

            /// Convert the record into a signal frame.
            pub fn to_signals(&self) -> SignalFrame {
                let mut frame = SignalFrame::new(Self::ID);
                $( frame.set($signal, self.$field); )*
                frame
            }

            /// Build the record from a signal frame, which must contain every
            /// signal.
            pub fn from_signals(frame: &SignalFrame) -> Result<Self, DecodeError> {
                if frame.id != Self::ID {
                    return Err(DecodeError::WrongMessage {
                        expected: Self::ID,
                        found: frame.id,
                    });
                }

                Ok(Self {
                    $(
                        $field: frame.get($signal).ok_or_else(|| DecodeError::MissingSignal {
                            id: Self::ID,
                            signal: $signal.to_string(),
                        })?,
                    )*
                })
            }
        }
    };
}

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Cruise control switch states carried in `Clu11::cruise_sw_state`.
pub struct Buttons;

impl Buttons {
    pub const NONE: f64 = 0.0;
    pub const RES_ACCEL: f64 = 1.0;
    pub const SET_DECEL: f64 = 2.0;
    pub const CANCEL: f64 = 4.0;
}

/// A fixed payload sent in place of a disconnected camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticMessage {
    pub id: u32,
    pub data: &'static [u8],
}

/// Camera status message.
pub const LKAS12: StaticMessage = StaticMessage {
    id: 1342,
    data: &[0x00, 0x00, 0x00, 0x00, 0x60, 0x05],
};

pub const MSG_1191: StaticMessage = StaticMessage {
    id: 1191,
    data: &[0x01, 0x00],
};

pub const MSG_1156: StaticMessage = StaticMessage {
    id: 1156,
    data: &[0x08, 0x20, 0xfe, 0x3f, 0x00, 0xe0, 0xfd, 0x3f],
};

// ------------------------------------------------------------------------------------------------
// RECORDS
// ------------------------------------------------------------------------------------------------

message_record! {
    /// Lane keeping assist command, sent by the camera and replaced by the
    /// controller.
    Lkas11 = 832;
    icon => "CF_Lkas_Icon",
    ldws_sys_state => "CF_Lkas_LdwsSysState",
    sys_warning => "CF_Lkas_SysWarning",
    ldws_lh_warning => "CF_Lkas_LdwsLHWarning",
    ldws_rh_warning => "CF_Lkas_LdwsRHWarning",
    hba_lamp => "CF_Lkas_HbaLamp",
    fcw_bas_req => "CF_Lkas_FcwBasReq",
    /// Requested steering torque, actuator units
    str_toq_req => "CR_Lkas_StrToqReq",
    act_toi => "CF_Lkas_ActToi",
    toi_flt => "CF_Lkas_ToiFlt",
    hba_sys_state => "CF_Lkas_HbaSysState",
    fcw_opt => "CF_Lkas_FcwOpt",
    hba_opt => "CF_Lkas_HbaOpt",
    msg_count => "CF_Lkas_MsgCount",
    fcw_sys_state => "CF_Lkas_FcwSysState",
    fcw_collision_warning => "CF_Lkas_FcwCollisionWarning",
    fusion_state => "CF_Lkas_FusionState",
    unknown1 => "CF_Lkas_Unknown1",
    chksum => "CF_Lkas_Chksum",
    fcw_opt_usm => "CF_Lkas_FcwOpt_USM",
    ldws_opt_usm => "CF_Lkas_LdwsOpt_USM",
    unknown2 => "CF_Lkas_Unknown2",
}

message_record! {
    /// Instrument cluster message, carries the cruise control buttons and the
    /// displayed speed.
    Clu11 = 1265;
    cruise_sw_state => "CF_Clu_CruiseSwState",
    cruise_sw_main => "CF_Clu_CruiseSwMain",
    sld_main_sw => "CF_Clu_SldMainSW",
    parity_bit1 => "CF_Clu_ParityBit1",
    vanz_decimal => "CF_Clu_VanzDecimal",
    /// Displayed vehicle speed
    vanz => "CF_Clu_Vanz",
    speed_unit => "CF_Clu_SPEED_UNIT",
    detent_out => "CF_Clu_DetentOut",
    rheostat_level => "CF_Clu_RheostatLevel",
    clu_info => "CF_Clu_CluInfo",
    amp_info => "CF_Clu_AmpInfo",
    alive_cnt1 => "CF_Clu_AliveCnt1",
}

message_record! {
    /// Power steering status.
    Mdps12 = 593;
    str_col_tq => "CR_Mdps_StrColTq",
    def => "CF_Mdps_Def",
    toi_active => "CF_Mdps_ToiActive",
    toi_unavail => "CF_Mdps_ToiUnavail",
    msg_count2 => "CF_Mdps_MsgCount2",
    chksum2 => "CF_Mdps_Chksum2",
    toi_flt => "CF_Mdps_ToiFlt",
    s_err => "CF_Mdps_SErr",
    /// Driver steering torque
    str_tq => "CR_Mdps_StrTq",
    fail_stat => "CF_Mdps_FailStat",
    out_tq => "CR_Mdps_OutTq",
}

message_record! {
    /// Smart cruise control acceleration request.
    Scc12 = 1057;
    vsm_prefill => "CF_VSM_Prefill",
    vsm_dec_cmd_act => "CF_VSM_DecCmdAct",
    vsm_hba_cmd => "CF_VSM_HBACmd",
    vsm_warn => "CF_VSM_Warn",
    vsm_stat => "CF_VSM_Stat",
    vsm_belt_cmd => "CF_VSM_BeltCmd",
    acc_fail_info => "ACCFailInfo",
    acc_mode => "ACCMode",
    stop_req => "StopReq",
    vsm_dec_cmd => "CR_VSM_DecCmd",
    /// Upper acceleration request, m/s^2
    a_req_max => "aReqMax",
    take_over_req => "TakeOverReq",
    pre_fill => "PreFill",
    /// Lower acceleration request, m/s^2
    a_req_min => "aReqMin",
    vsm_conf_mode => "CF_VSM_ConfMode",
    aeb_failinfo => "AEB_Failinfo",
    aeb_status => "AEB_Status",
    aeb_cmd_act => "AEB_CmdAct",
    aeb_stop_req => "AEB_StopReq",
    vsm_alive => "CR_VSM_Alive",
    vsm_chksum => "CR_VSM_ChkSum",
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_signals() {
        let clu = Clu11 {
            cruise_sw_state: Buttons::CANCEL,
            vanz: 60.0,
            ..Default::default()
        };

        let frame = clu.to_signals();
        assert_eq!(frame.id, Clu11::ID);
        assert_eq!(frame.len(), Clu11::SIGNALS.len());
        assert_eq!(frame.get("CF_Clu_CruiseSwState"), Some(4.0));
        assert_eq!(frame.get("CF_Clu_Vanz"), Some(60.0));

        assert_eq!(Clu11::from_signals(&frame), Ok(clu));
    }

    #[test]
    fn test_record_errors() {
        let frame = Lkas11::default().to_signals();
        assert_eq!(
            Clu11::from_signals(&frame),
            Err(DecodeError::WrongMessage {
                expected: Clu11::ID,
                found: Lkas11::ID
            })
        );

        let partial = SignalFrame::new(Mdps12::ID).with("CR_Mdps_StrColTq", 0.0);
        assert!(matches!(
            Mdps12::from_signals(&partial),
            Err(DecodeError::MissingSignal { .. })
        ));
    }
}
