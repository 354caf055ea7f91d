use crc::{CRC_16_ARC, CRC_16_XMODEM, Crc};
use serde::{Deserialize, Serialize};

use super::error::IntegrityError;

const IBM: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);
const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Width of the trailing checksum field in bytes.
pub const CHECKSUM_LEN: usize = 2;

/// CRC-16 variant used for the frame integrity layer.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ChecksumAlgorithm {
    /// Reflected polynomial `0x8005`, zero seed (CRC-16/ARC).
    #[default]
    Ibm,
    /// Polynomial `0x1021`, zero seed (CRC-16/XMODEM).
    Xmodem,
}

/// What to do when an inbound frame fails checksum verification.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ChecksumPolicy {
    /// Log the mismatch and keep processing the frame.
    #[default]
    LogOnly,
    /// Drop the frame.
    Enforce,
}

impl ChecksumAlgorithm {
    fn engine(self) -> &'static Crc<u16> {
        match self {
            Self::Ibm => &IBM,
            Self::Xmodem => &XMODEM,
        }
    }

    /// Computes the checksum of `bytes`.
    ///
    /// ```
    /// use vivolink::ChecksumAlgorithm;
    ///
    /// assert_eq!(0xBB3D, ChecksumAlgorithm::Ibm.compute(b"123456789"));
    /// assert_eq!(0x31C3, ChecksumAlgorithm::Xmodem.compute(b"123456789"));
    /// ```
    #[must_use]
    pub fn compute(self, bytes: &[u8]) -> u16 {
        self.engine().checksum(bytes)
    }

    /// Computes the checksum of `bytes` starting from `seed` instead of the
    /// algorithm's usual initial value.
    #[must_use]
    pub fn compute_seeded(self, seed: u16, bytes: &[u8]) -> u16 {
        let mut digest = self.engine().digest_with_initial(seed);
        digest.update(bytes);
        digest.finalize()
    }

    /// Returns `bytes` followed by their little-endian checksum.
    #[must_use]
    pub fn append(self, bytes: &[u8]) -> Vec<u8> {
        let mut framed = Vec::with_capacity(bytes.len() + CHECKSUM_LEN);
        framed.extend_from_slice(bytes);
        framed.extend_from_slice(&self.compute(bytes).to_le_bytes());
        framed
    }

    /// Checks the trailing checksum and returns the bytes it covers.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError`] when the buffer is shorter than the
    /// checksum field or the checksum does not match.
    pub fn verify(self, framed: &[u8]) -> Result<&[u8], IntegrityError> {
        let covered = self.split(framed)?;
        let carried = carried_checksum(framed);
        let computed = self.compute(covered);
        if computed != carried {
            return Err(IntegrityError::Mismatch { computed, carried });
        }
        Ok(covered)
    }

    /// Returns the bytes covered by the trailing checksum without checking it.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::MissingChecksum`] when the buffer is shorter
    /// than the checksum field.
    pub fn split(self, framed: &[u8]) -> Result<&[u8], IntegrityError> {
        framed
            .len()
            .checked_sub(CHECKSUM_LEN)
            .map(|covered_len| &framed[..covered_len])
            .ok_or(IntegrityError::MissingChecksum { len: framed.len() })
    }
}

fn carried_checksum(framed: &[u8]) -> u16 {
    let len = framed.len();
    u16::from_le_bytes([framed[len - 2], framed[len - 1]])
}
