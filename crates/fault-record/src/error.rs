//! Why a fault record was rejected.

use core::fmt;

/// Validation failure of a [`FaultRecord`](crate::FaultRecord).
///
/// Application code normally only needs [`FaultRecord::occurred`](crate::FaultRecord::occurred);
/// the variants exist for boot-time diagnostics and debug-link tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// `magic_number` is not [`FaultRecord::MAGIC`](crate::FaultRecord::MAGIC):
    /// nothing was captured, or the region was cleared.
    BadMagic {
        /// Value found in the magic field.
        found: u32,
    },
    /// The magic is present but the payload does not match the seal.
    CrcMismatch {
        /// Value in the `crc32` field.
        stored: u32,
        /// CRC recomputed over the payload.
        computed: u32,
    },
    /// A raw dump is not exactly one record long.
    Length {
        /// Bytes supplied.
        actual: usize,
        /// Bytes required.
        expected: usize,
    },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { found } => write!(f, "no fault record (magic {found:#010X})"),
            Self::CrcMismatch { stored, computed } => {
                write!(f, "fault record corrupted (crc {stored:#010X}, computed {computed:#010X})")
            }
            Self::Length { actual, expected } => {
                write!(f, "fault record dump is {actual} bytes, expected {expected}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RecordError {}
