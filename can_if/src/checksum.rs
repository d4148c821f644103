//! # Frame checksums
//!
//! The steering message carries a one byte checksum in byte 6 whose algorithm
//! differs between vehicles. Three variants are known, all of which skip the
//! checksum slot itself:
//!
//! - `Crc8`: CRC-8 with polynomial 0x11D over bytes 0..6 followed by byte 7.
//! - `Sum6`: the sum of bytes 0..6, modulo 256.
//! - `Sum7`: the sum of bytes 0..6 plus byte 7, modulo 256.
//!
//! The variant a vehicle uses is found once from a stock frame, see
//! `ChecksumDetector`. Some other messages use a fixed algorithm, which is
//! described by `ChecksumAlgorithm`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Index of the checksum byte in the steering message.
pub const CHECKSUM_SLOT: usize = 6;

/// CRC polynomial (0x11D with the implicit top bit dropped).
const CRC8_POLY: u8 = 0x1D;

/// CRC result for an empty input.
const CRC8_INIT: u8 = 0xFD;

/// Final XOR applied to the CRC register.
const CRC8_XOR_OUT: u8 = 0xDF;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The checksum algorithm used by a vehicle's steering message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumVariant {
    Crc8,
    Sum6,
    Sum7,
    None,
}

/// Algorithm used to fill a message's checksum signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChecksumAlgorithm {
    /// Use the vehicle's detected `ChecksumVariant`. The checksum signal must
    /// occupy byte 6.
    Vehicle,

    /// Sum of all bytes except `byte`, modulo 256.
    SumExcluding { byte: usize },

    /// Complement of the sum of every nibble in the frame, modulo 16. The
    /// checksum nibble is zero while summing.
    NibbleComplement,
}

/// Errors which can occur while detecting the checksum variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("Observed checksum matches more than one variant: {0:?}")]
    Ambiguous(Vec<ChecksumVariant>),

    #[error("Observed checksum does not match any known variant")]
    NoMatch,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Finds and caches a vehicle's checksum variant.
///
/// The first stock frame passed to `observe` decides the variant for the rest
/// of the drive. If that frame does not identify a single variant the
/// configured default is used instead and a warning is logged.
#[derive(Debug, Clone)]
pub struct ChecksumDetector {
    default: ChecksumVariant,
    detected: Option<ChecksumVariant>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChecksumVariant {
    /// The variants which `detect` tries.
    pub const CANDIDATES: [ChecksumVariant; 3] =
        [ChecksumVariant::Crc8, ChecksumVariant::Sum6, ChecksumVariant::Sum7];
}

impl Default for ChecksumVariant {
    fn default() -> Self {
        ChecksumVariant::Crc8
    }
}

impl ChecksumAlgorithm {
    /// Compute the checksum of `bytes` with this algorithm.
    ///
    /// `bytes` must already have the checksum field cleared.
    pub fn compute(&self, variant: ChecksumVariant, bytes: &[u8; 8]) -> u8 {
        match *self {
            ChecksumAlgorithm::Vehicle => compute(variant, bytes),
            ChecksumAlgorithm::SumExcluding { byte } => bytes
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != byte)
                .fold(0u8, |acc, (_, b)| acc.wrapping_add(*b)),
            ChecksumAlgorithm::NibbleComplement => {
                let sum: u32 = bytes
                    .iter()
                    .map(|b| u32::from(b & 0x0F) + u32::from(b >> 4))
                    .sum();
                ((16 - sum % 16) % 16) as u8
            }
        }
    }
}

impl ChecksumDetector {
    /// Create a new detector which falls back to `default` when a frame is
    /// ambiguous.
    pub fn new(default: ChecksumVariant) -> Self {
        Self {
            default,
            detected: None,
        }
    }

    /// The variant in use, the default if nothing has been observed yet.
    pub fn variant(&self) -> ChecksumVariant {
        self.detected.unwrap_or(self.default)
    }

    /// Returns `true` once a frame has been observed.
    pub fn is_detected(&self) -> bool {
        self.detected.is_some()
    }

    /// Observe a stock frame, detecting the variant if this is the first one.
    pub fn observe(&mut self, frame: &[u8; 8]) -> ChecksumVariant {
        if let Some(v) = self.detected {
            return v;
        }

        let variant = match detect(frame, frame[CHECKSUM_SLOT]) {
            Ok(v) => {
                info!("Detected steering message checksum variant: {:?}", v);
                v
            }
            Err(e) => {
                warn!(
                    "Could not detect checksum variant ({}), defaulting to {:?}",
                    e, self.default
                );
                self.default
            }
        };

        self.detected = Some(variant);
        variant
    }
}

impl Default for ChecksumDetector {
    fn default() -> Self {
        Self::new(ChecksumVariant::default())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the checksum of an 8 byte frame for the given variant.
///
/// Byte 6 is never read so the frame may hold a stale checksum.
pub fn compute(variant: ChecksumVariant, bytes: &[u8; 8]) -> u8 {
    match variant {
        ChecksumVariant::Crc8 => {
            let mut data = [0u8; 7];
            data[..CHECKSUM_SLOT].copy_from_slice(&bytes[..CHECKSUM_SLOT]);
            data[CHECKSUM_SLOT] = bytes[7];
            crc8(&data)
        }
        ChecksumVariant::Sum6 => sum(&bytes[..CHECKSUM_SLOT]),
        ChecksumVariant::Sum7 => sum(&bytes[..CHECKSUM_SLOT]).wrapping_add(bytes[7]),
        ChecksumVariant::None => 0,
    }
}

/// Find which variant produced `observed` for this frame.
pub fn detect(bytes: &[u8; 8], observed: u8) -> Result<ChecksumVariant, DetectError> {
    let matches: Vec<ChecksumVariant> = ChecksumVariant::CANDIDATES
        .iter()
        .copied()
        .filter(|v| compute(*v, bytes) == observed)
        .collect();

    match matches.len() {
        0 => Err(DetectError::NoMatch),
        1 => Ok(matches[0]),
        _ => Err(DetectError::Ambiguous(matches)),
    }
}

/// CRC-8, polynomial 0x11D, MSB first.
///
/// The initial value is given as the result for an empty input, so the
/// register starts at `CRC8_INIT ^ CRC8_XOR_OUT`.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT ^ CRC8_XOR_OUT;

    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc ^ CRC8_XOR_OUT
}

fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// Frame whose three candidate checksums all differ.
    const FRAME: [u8; 8] = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0x00, 0x3F];

    #[test]
    fn test_compute() {
        assert_eq!(crc8(&[]), 0xFD);
        assert_eq!(compute(ChecksumVariant::Crc8, &FRAME), 0x1E);
        assert_eq!(compute(ChecksumVariant::Sum6, &FRAME), 0x6A);
        assert_eq!(compute(ChecksumVariant::Sum7, &FRAME), 0xA9);
        assert_eq!(compute(ChecksumVariant::None, &FRAME), 0);

        // The slot byte is ignored
        let mut stale = FRAME;
        stale[CHECKSUM_SLOT] = 0xAA;
        for v in ChecksumVariant::CANDIDATES.iter() {
            assert_eq!(compute(*v, &stale), compute(*v, &FRAME));
        }
    }

    #[test]
    fn test_detect_round_trip() {
        for v in ChecksumVariant::CANDIDATES.iter() {
            let checksum = compute(*v, &FRAME);
            assert_eq!(detect(&FRAME, checksum), Ok(*v));
        }
    }

    #[test]
    fn test_detect_failures() {
        // With byte 7 zero the two sums coincide
        let frame = [1, 2, 3, 4, 5, 6, 0, 0];
        match detect(&frame, 21) {
            Err(DetectError::Ambiguous(vs)) => {
                assert!(vs.contains(&ChecksumVariant::Sum6));
                assert!(vs.contains(&ChecksumVariant::Sum7));
            }
            r => panic!("Expected an ambiguous result, got {:?}", r),
        }

        assert_eq!(detect(&FRAME, 0x00), Err(DetectError::NoMatch));
    }

    #[test]
    fn test_detector_caches() {
        let mut det = ChecksumDetector::default();
        assert_eq!(det.variant(), ChecksumVariant::Crc8);
        assert!(!det.is_detected());

        let mut stock = FRAME;
        stock[CHECKSUM_SLOT] = compute(ChecksumVariant::Sum7, &FRAME);
        assert_eq!(det.observe(&stock), ChecksumVariant::Sum7);

        // Later frames never change the cached variant
        stock[CHECKSUM_SLOT] = compute(ChecksumVariant::Sum6, &FRAME);
        assert_eq!(det.observe(&stock), ChecksumVariant::Sum7);
        assert_eq!(det.variant(), ChecksumVariant::Sum7);
    }

    #[test]
    fn test_detector_ambiguous_defaults() {
        let mut det = ChecksumDetector::new(ChecksumVariant::Crc8);
        let mut frame = [1, 2, 3, 4, 5, 6, 0, 0];
        frame[CHECKSUM_SLOT] = 21;

        assert_eq!(det.observe(&frame), ChecksumVariant::Crc8);
        assert!(det.is_detected());
    }

    #[test]
    fn test_fixed_algorithms() {
        let bytes = [0x10, 0x20, 0x30, 0xFF, 0x40, 0x50, 0x60, 0x70];
        let sum_ex = ChecksumAlgorithm::SumExcluding { byte: 3 };
        assert_eq!(sum_ex.compute(ChecksumVariant::None, &bytes), 0xC0);

        // Nibbles: 1+2+3+15+15+4+5+6+7 = 58, (16 - 58 % 16) % 16 = 6
        let nib = ChecksumAlgorithm::NibbleComplement;
        assert_eq!(nib.compute(ChecksumVariant::None, &bytes), 6);
        assert_eq!(nib.compute(ChecksumVariant::None, &[0u8; 8]), 0);
    }
}
