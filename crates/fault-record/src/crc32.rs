//! CRC-32 engine sealing the fault record.
//!
//! The variant is CRC-32/MPEG-2: polynomial `0x04C1_1DB7` processed MSB-first,
//! no input or output reflection, initial value `0xFFFF_FFFF`, no final XOR.
//! This is NOT the reflected CRC-32 used by zlib/Ethernet (`crc32fast`), so a
//! consumer must reproduce exactly this bit order to validate a record.
//!
//! The same loop is hand-written in the capture routine's assembly; the two
//! must stay bit-for-bit identical.

/// Initial CRC value used for the record seal.
pub const CRC32_INIT: u32 = 0xFFFF_FFFF;

/// Generator polynomial used for the record seal (normal, MSB-first form).
pub const CRC32_POLYNOMIAL: u32 = 0x04C1_1DB7;

/// Compute a CRC-32 over `data`, one byte at a time, MSB first.
///
/// Each byte is XOR'ed into the top eight bits of the running value, then the
/// value is shifted left eight times, XOR'ing in `polynomial` whenever a set
/// bit falls off the top.
///
/// ```
/// use fault_record::crc32::{crc32, CRC32_INIT, CRC32_POLYNOMIAL};
///
/// // CRC-32/MPEG-2 check value.
/// assert_eq!(crc32(CRC32_INIT, b"123456789", CRC32_POLYNOMIAL), 0x0376_E6E7);
/// ```
// `bit` is bounded by 8; `u32::from` is not usable in a `const fn`.
#[allow(clippy::arithmetic_side_effects, clippy::cast_lossless)]
pub const fn crc32(init: u32, data: &[u8], polynomial: u32) -> u32 {
    let mut crc = init;
    let mut rest = data;
    while let [byte, tail @ ..] = rest {
        crc ^= (*byte as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            let carry = crc & 0x8000_0000 != 0;
            crc = crc.wrapping_shl(1);
            if carry {
                crc ^= polynomial;
            }
            bit += 1;
        }
        rest = tail;
    }
    crc
}
