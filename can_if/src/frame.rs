//! # Frame codec
//!
//! Maps named physical signal values to and from fixed-layout CAN payloads.
//! Message layouts are data, loaded from a parameter file at start-up and
//! checked once with `LayoutTable::validate`, so the codec itself holds no
//! per-message logic.
//!
//! Signals use the usual DBC conventions: for little-endian (Intel) signals
//! `start_bit` is the LSB, counted from bit 0 of byte 0. For big-endian
//! (Motorola) signals `start_bit` is the MSB with bits numbered sequentially
//! from the MSB of byte 0.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checksum::{ChecksumAlgorithm, ChecksumVariant, CHECKSUM_SLOT};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum payload length of a classic CAN frame.
pub const MAX_FRAME_LEN: usize = 8;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Bit ordering of a signal within the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Where a field of a synthesised frame takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Copy the value from the most recent stock frame.
    Stock,

    /// Use the locally computed value.
    Computed,
}

/// Problems with the layout configuration. These are fatal at start-up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Message id {0} is defined more than once")]
    DuplicateMessage(u32),

    #[error("Message {message} has an invalid length of {len} bytes")]
    InvalidLength { message: String, len: usize },

    #[error("Signal {message}.{signal} is defined more than once")]
    DuplicateSignal { message: String, signal: String },

    #[error("Signal {message}.{signal} has zero width")]
    ZeroWidth { message: String, signal: String },

    #[error("Signal {message}.{signal} does not fit inside the frame")]
    OutOfFrame { message: String, signal: String },

    #[error("Signal {message}.{signal} overlaps another signal")]
    Overlap { message: String, signal: String },

    #[error("Signal {message}.{signal} has an invalid scale of {scale}")]
    InvalidScale {
        message: String,
        signal: String,
        scale: f64,
    },

    #[error("Message {message} names an unknown {role} signal {signal}")]
    DanglingSignal {
        message: String,
        role: &'static str,
        signal: String,
    },

    #[error("Checksum signal {message}.{signal} does not suit its algorithm")]
    InvalidChecksumField { message: String, signal: String },

    #[error("Counter {message}.{signal} cannot hold a modulus of {modulus}")]
    InvalidCounterModulus {
        message: String,
        signal: String,
        modulus: u64,
    },
}

/// Errors produced while encoding a frame. These suppress the frame but are
/// recoverable on the next cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("No layout for message id {0}")]
    UnknownMessage(u32),

    #[error("Message {id} is missing signal {signal}")]
    MissingSignal { id: u32, signal: String },

    #[error("Value {value} of {id}.{signal} does not fit the signal's bit width")]
    OutOfRange { id: u32, signal: String, value: f64 },

    #[error("Value of {id}.{signal} is not finite")]
    NonFinite { id: u32, signal: String },
}

/// Errors produced while decoding a frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("No layout for message id {0}")]
    UnknownMessage(u32),

    #[error("Message {id} should be {expected} bytes but only {found} were given")]
    TooShort {
        id: u32,
        expected: usize,
        found: usize,
    },

    #[error("Expected message {expected} but got {found}")]
    WrongMessage { expected: u32, found: u32 },

    #[error("Message {id} is missing signal {signal}")]
    MissingSignal { id: u32, signal: String },
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Position and scaling of a single signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalLayout {
    pub name: String,

    pub start_bit: u32,

    pub width: u32,

    /// Physical value = raw * scale + offset
    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default)]
    pub offset: f64,

    /// Raw value is two's complement
    #[serde(default)]
    pub signed: bool,

    #[serde(default = "default_byte_order")]
    pub byte_order: ByteOrder,
}

/// Names the checksum signal of a message and the algorithm that fills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecksumSpec {
    pub signal: String,
    pub algorithm: ChecksumAlgorithm,
}

/// Names the rolling counter of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterSpec {
    pub signal: String,
    pub modulus: u64,
}

/// Layout of one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLayout {
    pub id: u32,

    pub name: String,

    /// Payload length in bytes
    pub len: usize,

    pub signals: Vec<SignalLayout>,

    #[serde(default)]
    pub checksum: Option<ChecksumSpec>,

    #[serde(default)]
    pub counter: Option<CounterSpec>,
}

/// The set of message layouts known to the codec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutTable {
    pub messages: Vec<MessageLayout>,
}

/// An ordered set of named physical values for one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalFrame {
    pub id: u32,
    signals: Vec<(String, f64)>,
}

/// Per-field source selection for synthesised frames.
///
/// Fields not in the table are `Computed`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyTable {
    fields: HashMap<String, FieldPolicy>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SignalLayout {
    /// An unsigned little-endian signal with unit scale.
    pub fn new(name: &str, start_bit: u32, width: u32) -> Self {
        Self {
            name: name.to_string(),
            start_bit,
            width,
            scale: 1.0,
            offset: 0.0,
            signed: false,
            byte_order: ByteOrder::LittleEndian,
        }
    }

    pub fn scaled(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.byte_order = ByteOrder::BigEndian;
        self
    }

    /// Mask covering the signal's raw bits.
    fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Inclusive range of raw values the signal can hold.
    fn raw_range(&self) -> (i128, i128) {
        let w = self.width.max(1).min(64);
        if self.signed {
            (-(1i128 << (w - 1)), (1i128 << (w - 1)) - 1)
        } else {
            (0, (1i128 << w) - 1)
        }
    }

    /// Bitmask of the payload bits this signal occupies, indexed as
    /// `byte * 8 + bit_in_byte`.
    fn occupancy(&self) -> u64 {
        (0..self.width).fold(0u64, |acc, i| {
            let p = self.start_bit + i;
            let bit = match self.byte_order {
                ByteOrder::LittleEndian => p,
                ByteOrder::BigEndian => (p / 8) * 8 + (7 - p % 8),
            };
            acc | (1u64 << bit)
        })
    }

    /// Convert a physical value into raw bits.
    fn to_raw(&self, id: u32, value: f64) -> Result<u64, EncodeError> {
        if !value.is_finite() {
            return Err(EncodeError::NonFinite {
                id,
                signal: self.name.clone(),
            });
        }

        let raw = ((value - self.offset) / self.scale).round();
        let (min, max) = self.raw_range();

        if raw < min as f64 || raw > max as f64 {
            return Err(EncodeError::OutOfRange {
                id,
                signal: self.name.clone(),
                value,
            });
        }

        Ok((raw as i64 as u64) & self.mask())
    }

    /// Convert raw bits into a physical value.
    fn to_physical(&self, raw: u64) -> f64 {
        let value = if self.signed && self.width < 64 && raw & (1 << (self.width - 1)) != 0 {
            (raw as i64) - (1i64 << self.width)
        } else {
            raw as i64
        };

        value as f64 * self.scale + self.offset
    }

    /// Write raw bits into the payload.
    fn insert(&self, bytes: &mut [u8; MAX_FRAME_LEN], raw: u64) {
        let mask = self.mask();
        match self.byte_order {
            ByteOrder::LittleEndian => {
                let shift = self.start_bit;
                let word = LittleEndian::read_u64(bytes);
                let word = (word & !(mask << shift)) | ((raw & mask) << shift);
                LittleEndian::write_u64(bytes, word);
            }
            ByteOrder::BigEndian => {
                let shift = 64 - self.start_bit - self.width;
                let word = BigEndian::read_u64(bytes);
                let word = (word & !(mask << shift)) | ((raw & mask) << shift);
                BigEndian::write_u64(bytes, word);
            }
        }
    }

    /// Read raw bits from the payload.
    fn extract(&self, bytes: &[u8; MAX_FRAME_LEN]) -> u64 {
        match self.byte_order {
            ByteOrder::LittleEndian => {
                (LittleEndian::read_u64(bytes) >> self.start_bit) & self.mask()
            }
            ByteOrder::BigEndian => {
                let shift = 64 - self.start_bit - self.width;
                (BigEndian::read_u64(bytes) >> shift) & self.mask()
            }
        }
    }
}

impl MessageLayout {
    /// Find a signal by name.
    pub fn signal(&self, name: &str) -> Option<&SignalLayout> {
        self.signals.iter().find(|s| s.name == name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.len == 0 || self.len > MAX_FRAME_LEN {
            return Err(ConfigError::InvalidLength {
                message: self.name.clone(),
                len: self.len,
            });
        }

        let mut names = HashSet::new();
        let mut occupied = 0u64;

        for s in &self.signals {
            let err_ctx = || (self.name.clone(), s.name.clone());

            if !names.insert(s.name.as_str()) {
                let (message, signal) = err_ctx();
                return Err(ConfigError::DuplicateSignal { message, signal });
            }
            if s.width == 0 {
                let (message, signal) = err_ctx();
                return Err(ConfigError::ZeroWidth { message, signal });
            }
            if (s.start_bit + s.width) as usize > self.len * 8 {
                let (message, signal) = err_ctx();
                return Err(ConfigError::OutOfFrame { message, signal });
            }
            if !s.scale.is_finite() || s.scale == 0.0 || !s.offset.is_finite() {
                let (message, signal) = err_ctx();
                return Err(ConfigError::InvalidScale {
                    message,
                    signal,
                    scale: s.scale,
                });
            }

            let occ = s.occupancy();
            if occupied & occ != 0 {
                let (message, signal) = err_ctx();
                return Err(ConfigError::Overlap { message, signal });
            }
            occupied |= occ;
        }

        if let Some(ref cs) = self.checksum {
            let sig = self.signal(&cs.signal).ok_or_else(|| ConfigError::DanglingSignal {
                message: self.name.clone(),
                role: "checksum",
                signal: cs.signal.clone(),
            })?;

            let raw_field = !sig.signed
                && sig.scale == 1.0
                && sig.offset == 0.0
                && sig.byte_order == ByteOrder::LittleEndian;

            let suits = raw_field
                && match cs.algorithm {
                    ChecksumAlgorithm::Vehicle => {
                        self.len == MAX_FRAME_LEN
                            && sig.width == 8
                            && sig.start_bit as usize == CHECKSUM_SLOT * 8
                    }
                    ChecksumAlgorithm::SumExcluding { byte } => {
                        sig.width == 8 && sig.start_bit as usize == byte * 8
                    }
                    ChecksumAlgorithm::NibbleComplement => sig.width == 4,
                };

            if !suits {
                return Err(ConfigError::InvalidChecksumField {
                    message: self.name.clone(),
                    signal: cs.signal.clone(),
                });
            }
        }

        if let Some(ref cnt) = self.counter {
            let sig = self.signal(&cnt.signal).ok_or_else(|| ConfigError::DanglingSignal {
                message: self.name.clone(),
                role: "counter",
                signal: cnt.signal.clone(),
            })?;

            let (_, max) = sig.raw_range();
            if cnt.modulus == 0 || i128::from(cnt.modulus) > max + 1 {
                return Err(ConfigError::InvalidCounterModulus {
                    message: self.name.clone(),
                    signal: cnt.signal.clone(),
                    modulus: cnt.modulus,
                });
            }
        }

        Ok(())
    }

    /// Serialise raw values, in layout order, into a payload.
    fn pack(&self, raws: &[u64]) -> [u8; MAX_FRAME_LEN] {
        let mut bytes = [0u8; MAX_FRAME_LEN];
        for (s, raw) in self.signals.iter().zip(raws.iter()) {
            s.insert(&mut bytes, *raw);
        }
        bytes
    }

    fn compute_checksum(
        &self,
        cs: &ChecksumSpec,
        bytes: &[u8; MAX_FRAME_LEN],
        variant: ChecksumVariant,
    ) -> u64 {
        u64::from(cs.algorithm.compute(variant, bytes))
    }
}

impl LayoutTable {
    /// Check every layout, rejecting overlapping or out of frame signals,
    /// zero widths and dangling checksum or counter names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();

        for m in &self.messages {
            if !ids.insert(m.id) {
                return Err(ConfigError::DuplicateMessage(m.id));
            }
            m.validate()?;
        }

        Ok(())
    }

    /// Get the layout of a message.
    pub fn get(&self, id: u32) -> Option<&MessageLayout> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Encode a frame.
    ///
    /// The checksum field is written as 0, the frame serialised, the checksum
    /// computed over those bytes and the frame serialised again with the
    /// checksum in place. Any value supplied for the checksum signal is
    /// ignored. Counter values are wrapped by the layout's modulus.
    ///
    /// Bytes beyond the message length are zero.
    pub fn encode(
        &self,
        frame: &SignalFrame,
        variant: ChecksumVariant,
    ) -> Result<[u8; MAX_FRAME_LEN], EncodeError> {
        let id = frame.id;
        let layout = self.get(id).ok_or(EncodeError::UnknownMessage(id))?;

        let checksum_name = layout.checksum.as_ref().map(|c| c.signal.as_str());
        let mut checksum_idx = None;
        let mut raws = Vec::with_capacity(layout.signals.len());

        for (i, s) in layout.signals.iter().enumerate() {
            if Some(s.name.as_str()) == checksum_name {
                checksum_idx = Some(i);
                raws.push(0);
                continue;
            }

            let mut value = frame.get(&s.name).ok_or_else(|| EncodeError::MissingSignal {
                id,
                signal: s.name.clone(),
            })?;

            if let Some(ref cnt) = layout.counter {
                if cnt.signal == s.name && value.is_finite() {
                    value = (value.round() as i64).rem_euclid(cnt.modulus as i64) as f64;
                }
            }

            raws.push(s.to_raw(id, value)?);
        }

        let mut bytes = layout.pack(&raws);

        if let (Some(cs), Some(i)) = (layout.checksum.as_ref(), checksum_idx) {
            raws[i] = layout.compute_checksum(cs, &bytes, variant);
            bytes = layout.pack(&raws);
        }

        Ok(bytes)
    }

    /// Decode a payload into physical values.
    pub fn decode(&self, id: u32, data: &[u8]) -> Result<SignalFrame, DecodeError> {
        let (layout, bytes) = self.load_payload(id, data)?;

        let mut frame = SignalFrame::new(id);
        for s in &layout.signals {
            frame.set(&s.name, s.to_physical(s.extract(&bytes)));
        }

        Ok(frame)
    }

    /// Check a payload's checksum. Messages without a checksum always pass.
    pub fn verify(
        &self,
        id: u32,
        data: &[u8],
        variant: ChecksumVariant,
    ) -> Result<bool, DecodeError> {
        let (layout, mut bytes) = self.load_payload(id, data)?;

        let cs = match layout.checksum {
            Some(ref cs) => cs,
            None => return Ok(true),
        };
        let sig = layout
            .signal(&cs.signal)
            .ok_or_else(|| DecodeError::MissingSignal {
                id,
                signal: cs.signal.clone(),
            })?;

        let observed = sig.extract(&bytes);
        sig.insert(&mut bytes, 0);

        Ok(layout.compute_checksum(cs, &bytes, variant) == observed)
    }

    fn load_payload(
        &self,
        id: u32,
        data: &[u8],
    ) -> Result<(&MessageLayout, [u8; MAX_FRAME_LEN]), DecodeError> {
        let layout = self.get(id).ok_or(DecodeError::UnknownMessage(id))?;

        if data.len() < layout.len {
            return Err(DecodeError::TooShort {
                id,
                expected: layout.len,
                found: data.len(),
            });
        }

        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[..layout.len].copy_from_slice(&data[..layout.len]);

        Ok((layout, bytes))
    }
}

impl SignalFrame {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            signals: Vec::new(),
        }
    }

    /// Builder form of `set`.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Set a value, keeping the signal's original position if it exists.
    pub fn set(&mut self, name: &str, value: f64) {
        match self.signals.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.signals.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.signals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.signals.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table where each of the given fields is `Stock`.
    pub fn with_stock<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        table.extend_stock(fields);
        table
    }

    /// Mark each of the given fields as `Stock`.
    pub fn extend_stock<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for f in fields {
            self.set(f.as_ref(), FieldPolicy::Stock);
        }
    }

    pub fn set(&mut self, field: &str, policy: FieldPolicy) {
        self.fields.insert(field.to_string(), policy);
    }

    pub fn get(&self, field: &str) -> FieldPolicy {
        self.fields
            .get(field)
            .copied()
            .unwrap_or(FieldPolicy::Computed)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Select each field of `computed` from either itself or the stock frame.
///
/// A `Stock` field falls back to the computed value when no stock frame has
/// been observed or the stock frame lacks that field.
pub fn apply_policy(
    computed: &SignalFrame,
    stock: Option<&SignalFrame>,
    policy: &PolicyTable,
) -> SignalFrame {
    let mut out = SignalFrame::new(computed.id);

    for (name, value) in computed.iter() {
        let value = match (policy.get(name), stock) {
            (FieldPolicy::Stock, Some(s)) => s.get(name).unwrap_or(value),
            _ => value,
        };
        out.set(name, value);
    }

    out
}

fn default_scale() -> f64 {
    1.0
}

fn default_byte_order() -> ByteOrder {
    ByteOrder::LittleEndian
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::checksum;
    use proptest::prelude::*;

    const STEER_ID: u32 = 832;
    const BUTTON_ID: u32 = 1265;

    fn steer_layout() -> MessageLayout {
        MessageLayout {
            id: STEER_ID,
            name: "STEER".into(),
            len: 8,
            signals: vec![
                SignalLayout::new("State", 0, 4),
                SignalLayout::new("Torque", 16, 11).scaled(1.0, -1024.0),
                SignalLayout::new("Active", 27, 1),
                SignalLayout::new("Count", 36, 4),
                SignalLayout::new("Chksum", 48, 8),
                SignalLayout::new("Tail", 56, 3),
            ],
            checksum: Some(ChecksumSpec {
                signal: "Chksum".into(),
                algorithm: ChecksumAlgorithm::Vehicle,
            }),
            counter: Some(CounterSpec {
                signal: "Count".into(),
                modulus: 16,
            }),
        }
    }

    fn button_layout() -> MessageLayout {
        MessageLayout {
            id: BUTTON_ID,
            name: "BUTTON".into(),
            len: 4,
            signals: vec![
                SignalLayout::new("Switch", 0, 3),
                SignalLayout::new("Speed", 8, 9).scaled(0.5, 0.0),
                SignalLayout::new("Temp", 17, 7).scaled(1.0, 0.0).signed(),
                SignalLayout::new("Motorola", 24, 8).big_endian(),
            ],
            checksum: None,
            counter: None,
        }
    }

    fn table() -> LayoutTable {
        LayoutTable {
            messages: vec![steer_layout(), button_layout()],
        }
    }

    fn steer_frame(torque: f64, count: f64) -> SignalFrame {
        SignalFrame::new(STEER_ID)
            .with("State", 3.0)
            .with("Torque", torque)
            .with("Active", 1.0)
            .with("Count", count)
            .with("Tail", 5.0)
    }

    #[test]
    fn test_validate_ok() {
        assert_eq!(table().validate(), Ok(()));
    }

    #[test]
    fn test_validate_errors() {
        let mut t = table();
        t.messages[0].signals.push(SignalLayout::new("Clash", 2, 4));
        assert!(matches!(t.validate(), Err(ConfigError::Overlap { .. })));

        let mut t = table();
        t.messages[1].signals.push(SignalLayout::new("Past", 30, 4));
        assert!(matches!(t.validate(), Err(ConfigError::OutOfFrame { .. })));

        let mut t = table();
        t.messages[1].signals.push(SignalLayout::new("Empty", 4, 0));
        assert!(matches!(t.validate(), Err(ConfigError::ZeroWidth { .. })));

        let mut t = table();
        t.messages[0].checksum.as_mut().unwrap().signal = "Nope".into();
        assert!(matches!(
            t.validate(),
            Err(ConfigError::DanglingSignal { role: "checksum", .. })
        ));

        let mut t = table();
        t.messages[0].counter.as_mut().unwrap().modulus = 17;
        assert!(matches!(
            t.validate(),
            Err(ConfigError::InvalidCounterModulus { .. })
        ));

        let mut t = table();
        t.messages.push(button_layout());
        assert_eq!(t.validate(), Err(ConfigError::DuplicateMessage(BUTTON_ID)));
    }

    #[test]
    fn test_encode_places_checksum() {
        let t = table();
        let frame = steer_frame(-3.0, 7.0);

        for v in ChecksumVariant::CANDIDATES.iter() {
            let bytes = t.encode(&frame, *v).unwrap();

            let mut zeroed = bytes;
            zeroed[CHECKSUM_SLOT] = 0;
            assert_eq!(bytes[CHECKSUM_SLOT], checksum::compute(*v, &zeroed));
            assert_eq!(t.verify(STEER_ID, &bytes, *v), Ok(true));
        }
    }

    #[test]
    fn test_encode_idempotent() {
        let t = table();
        let frame = steer_frame(250.0, 9.0);

        let a = t.encode(&frame, ChecksumVariant::Crc8).unwrap();
        let b = t.encode(&frame, ChecksumVariant::Crc8).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_decode() {
        let t = table();
        let bytes = t.encode(&steer_frame(-100.0, 18.0), ChecksumVariant::Sum6).unwrap();
        let decoded = t.decode(STEER_ID, &bytes).unwrap();

        assert_eq!(decoded.get("State"), Some(3.0));
        assert_eq!(decoded.get("Torque"), Some(-100.0));
        assert_eq!(decoded.get("Active"), Some(1.0));
        // Counter wraps modulo 16
        assert_eq!(decoded.get("Count"), Some(2.0));
        assert_eq!(decoded.get("Tail"), Some(5.0));

        let button = SignalFrame::new(BUTTON_ID)
            .with("Switch", 4.0)
            .with("Speed", 60.5)
            .with("Temp", -12.0)
            .with("Motorola", 0xA5 as f64);
        let bytes = t.encode(&button, ChecksumVariant::None).unwrap();
        assert_eq!(bytes[3], 0xA5);
        assert_eq!(&bytes[4..], &[0, 0, 0, 0]);

        let decoded = t.decode(BUTTON_ID, &bytes[..4]).unwrap();
        assert_eq!(decoded, button);
    }

    #[test]
    fn test_encode_errors() {
        let t = table();

        assert_eq!(
            t.encode(&SignalFrame::new(1), ChecksumVariant::Crc8),
            Err(EncodeError::UnknownMessage(1))
        );

        let missing = SignalFrame::new(STEER_ID).with("State", 3.0);
        assert!(matches!(
            t.encode(&missing, ChecksumVariant::Crc8),
            Err(EncodeError::MissingSignal { .. })
        ));

        assert!(matches!(
            t.encode(&steer_frame(1024.0, 0.0), ChecksumVariant::Crc8),
            Err(EncodeError::OutOfRange { .. })
        ));
        assert!(matches!(
            t.encode(&steer_frame(std::f64::NAN, 0.0), ChecksumVariant::Crc8),
            Err(EncodeError::NonFinite { .. })
        ));

        assert_eq!(
            t.decode(BUTTON_ID, &[0, 0]),
            Err(DecodeError::TooShort {
                id: BUTTON_ID,
                expected: 4,
                found: 2
            })
        );
    }

    #[test]
    fn test_verify_detects_corruption() {
        let t = table();
        let mut bytes = t.encode(&steer_frame(12.0, 1.0), ChecksumVariant::Crc8).unwrap();
        bytes[0] ^= 0x01;
        assert_eq!(t.verify(STEER_ID, &bytes, ChecksumVariant::Crc8), Ok(false));
    }

    #[test]
    fn test_apply_policy() {
        let computed = SignalFrame::new(STEER_ID)
            .with("State", 1.0)
            .with("Torque", 10.0)
            .with("Tail", 0.0);
        let stock = SignalFrame::new(STEER_ID)
            .with("State", 2.0)
            .with("Torque", -5.0);
        let policy = PolicyTable::with_stock(&["State", "Tail"]);

        let out = apply_policy(&computed, Some(&stock), &policy);
        assert_eq!(out.get("State"), Some(2.0));
        assert_eq!(out.get("Torque"), Some(10.0));
        // Stock frame lacks the field so the computed value is kept
        assert_eq!(out.get("Tail"), Some(0.0));

        // No stock frame observed yet
        assert_eq!(apply_policy(&computed, None, &policy), computed);
    }

    proptest! {
        #[test]
        fn prop_decode_reencodes_identically(
            torque in -1024i32..1024,
            count in 0u32..64,
            variant in prop::sample::select(ChecksumVariant::CANDIDATES.to_vec()),
        ) {
            let t = table();
            let bytes = t.encode(&steer_frame(torque as f64, count as f64), variant).unwrap();

            prop_assert_eq!(t.verify(STEER_ID, &bytes, variant), Ok(true));

            let decoded = t.decode(STEER_ID, &bytes).unwrap();
            prop_assert_eq!(decoded.get("Torque"), Some(torque as f64));
            prop_assert_eq!(decoded.get("Count"), Some((count % 16) as f64));
            prop_assert_eq!(t.encode(&decoded, variant).unwrap(), bytes);
        }
    }
}
