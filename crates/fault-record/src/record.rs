//! The persisted fault record.
//!
//! One `#[repr(C)]` block of 36 little-endian words. The capture routine
//! addresses fields by the byte offsets in [`offset`]; those are checked
//! against the struct at compile time, so the assembly and the Rust view can
//! never drift apart.
//!
//! Validity is "magic present AND CRC over bytes 8..144 matches". The magic is
//! written last, so a capture interrupted halfway never looks valid.

use core::mem::offset_of;
use core::ops::Range;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::crc32::{crc32, CRC32_INIT, CRC32_POLYNOMIAL};
use crate::error::RecordError;
use crate::info::{FaultInfo, InfoFlags};
use crate::scb;

/// Captured processor state, sealed with a CRC.
///
/// Every optional group is meaningful only when its [`InfoFlags`] bit is set
/// in [`info`](Self::info); use the accessor methods rather than reading the
/// raw fields.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultRecord {
    /// [`FaultRecord::MAGIC`] once a capture completed.
    pub magic_number: u32,
    /// CRC-32/MPEG-2 over [`FaultRecord::PAYLOAD`].
    pub crc32: u32,
    /// Number of captures since the record was last cleared.
    pub count: u32,
    /// Format version and content flags.
    pub info: FaultInfo,
    /// R0-R12. R0-R3 and R12 come from the stacked frame; R4-R11 are the
    /// handler-entry values, or the additional state context when one was stacked.
    pub r: [u32; 13],
    /// Stacked LR.
    pub lr: u32,
    /// Stacked return address (the faulting instruction for precise faults).
    pub return_address: u32,
    /// Stacked xPSR.
    pub xpsr: u32,
    /// xPSR inside the fault handler (IPSR = exception number).
    pub exc_xpsr: u32,
    /// EXC_RETURN the fault handler was entered with.
    pub exc_return: u32,
    /// MSP (or MSP_NS) inside the fault handler.
    pub msp: u32,
    /// PSP (or PSP_NS) inside the fault handler.
    pub psp: u32,
    /// MSPLIM (or MSPLIM_NS).
    pub msplim: u32,
    /// PSPLIM (or PSPLIM_NS).
    pub psplim: u32,
    /// Configurable Fault Status Register.
    pub cfsr: u32,
    /// HardFault Status Register.
    pub hfsr: u32,
    /// Debug Fault Status Register.
    pub dfsr: u32,
    /// MemManage Fault Address Register.
    pub mmfar: u32,
    /// BusFault Address Register.
    pub bfar: u32,
    /// Auxiliary Fault Status Register.
    pub afsr: u32,
    /// SecureFault Status Register.
    pub sfsr: u32,
    /// SecureFault Address Register.
    pub sfar: u32,
    /// RAS Fault Status Register.
    pub rfsr: u32,
    /// Integrity signature of the additional state context, if one was stacked.
    pub integrity_signature: u32,
}

/// Byte offsets of [`FaultRecord`] fields, as used by the capture routine.
pub mod offset {
    /// `magic_number`.
    pub const MAGIC_NUMBER: usize = 0;
    /// `crc32`.
    pub const CRC32: usize = 4;
    /// `count`, start of the CRC payload.
    pub const COUNT: usize = 8;
    /// `info`.
    pub const INFO: usize = 12;
    /// `r[0]`.
    pub const R0: usize = 16;
    /// `r[4]`.
    pub const R4: usize = R0 + 4 * 4;
    /// `r[12]`, followed by `lr`, `return_address`, `xpsr`.
    pub const R12: usize = R0 + 12 * 4;
    /// `lr`.
    pub const LR: usize = 68;
    /// `return_address`.
    pub const RETURN_ADDRESS: usize = 72;
    /// `xpsr`.
    pub const XPSR: usize = 76;
    /// `exc_xpsr`, followed by `exc_return`, `msp`, `psp`, `msplim`, `psplim`.
    pub const EXC_XPSR: usize = 80;
    /// `exc_return`.
    pub const EXC_RETURN: usize = 84;
    /// `msp`.
    pub const MSP: usize = 88;
    /// `psp`.
    pub const PSP: usize = 92;
    /// `msplim`.
    pub const MSPLIM: usize = 96;
    /// `psplim`.
    pub const PSPLIM: usize = 100;
    /// `cfsr`, followed by `hfsr`, `dfsr`, `mmfar`, `bfar`, `afsr`.
    pub const CFSR: usize = 104;
    /// `sfsr`, followed by `sfar`.
    pub const SFSR: usize = 128;
    /// `sfar`.
    pub const SFAR: usize = 132;
    /// `rfsr`.
    pub const RFSR: usize = 136;
    /// `integrity_signature`.
    pub const INTEGRITY_SIGNATURE: usize = 140;
}

const _: () = {
    assert!(offset::MAGIC_NUMBER == offset_of!(FaultRecord, magic_number));
    assert!(offset::CRC32 == offset_of!(FaultRecord, crc32));
    assert!(offset::COUNT == offset_of!(FaultRecord, count));
    assert!(offset::INFO == offset_of!(FaultRecord, info));
    assert!(offset::R0 == offset_of!(FaultRecord, r));
    assert!(offset::LR == offset_of!(FaultRecord, lr));
    assert!(offset::R12 + 4 == offset::LR);
    assert!(offset::RETURN_ADDRESS == offset_of!(FaultRecord, return_address));
    assert!(offset::XPSR == offset_of!(FaultRecord, xpsr));
    assert!(offset::EXC_XPSR == offset_of!(FaultRecord, exc_xpsr));
    assert!(offset::EXC_RETURN == offset_of!(FaultRecord, exc_return));
    assert!(offset::MSP == offset_of!(FaultRecord, msp));
    assert!(offset::PSP == offset_of!(FaultRecord, psp));
    assert!(offset::MSPLIM == offset_of!(FaultRecord, msplim));
    assert!(offset::PSPLIM == offset_of!(FaultRecord, psplim));
    assert!(offset::CFSR == offset_of!(FaultRecord, cfsr));
    assert!(offset::CFSR + 20 == offset_of!(FaultRecord, afsr));
    assert!(offset::SFSR == offset_of!(FaultRecord, sfsr));
    assert!(offset::SFAR == offset_of!(FaultRecord, sfar));
    assert!(offset::RFSR == offset_of!(FaultRecord, rfsr));
    assert!(offset::INTEGRITY_SIGNATURE == offset_of!(FaultRecord, integrity_signature));
    assert!(FaultRecord::SIZE == core::mem::size_of::<FaultRecord>());
    assert!(FaultRecord::SIZE == FaultRecord::WORDS * 4);
};

/// Basic state context copied from the exception frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackedFrame {
    /// R0.
    pub r0: u32,
    /// R1.
    pub r1: u32,
    /// R2.
    pub r2: u32,
    /// R3.
    pub r3: u32,
    /// R12.
    pub r12: u32,
    /// LR of the interrupted code.
    pub lr: u32,
    /// Return address.
    pub return_address: u32,
    /// xPSR of the interrupted code.
    pub xpsr: u32,
}

/// MSPLIM/PSPLIM pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackLimits {
    /// MSPLIM.
    pub msplim: u32,
    /// PSPLIM.
    pub psplim: u32,
}

/// SCB fault status and address registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultStatus {
    /// CFSR.
    pub cfsr: u32,
    /// HFSR.
    pub hfsr: u32,
    /// DFSR.
    pub dfsr: u32,
    /// MMFAR.
    pub mmfar: u32,
    /// BFAR.
    pub bfar: u32,
    /// AFSR.
    pub afsr: u32,
}

impl FaultStatus {
    /// MMFAR holds the faulting data address.
    pub const fn mmfar_valid(&self) -> bool {
        self.cfsr & scb::CFSR_MMARVALID != 0
    }

    /// BFAR holds the faulting data address.
    pub const fn bfar_valid(&self) -> bool {
        self.cfsr & scb::CFSR_BFARVALID != 0
    }

    /// The fault was raised while stacking the exception frame.
    pub const fn stacking_error(&self) -> bool {
        self.cfsr & (scb::CFSR_STACK_ERR | scb::CFSR_STKOF) != 0
    }

    /// HardFault escalated from a configurable fault.
    pub const fn forced(&self) -> bool {
        self.hfsr & scb::HFSR_FORCED != 0
    }

    /// HardFault raised by a bus error on a vector table read.
    pub const fn vector_table_read(&self) -> bool {
        self.hfsr & scb::HFSR_VECTTBL != 0
    }
}

/// SFSR/SFAR pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecureFaultStatus {
    /// SFSR.
    pub sfsr: u32,
    /// SFAR.
    pub sfar: u32,
}

impl FaultRecord {
    /// "FltR" read as a little-endian word.
    pub const MAGIC: u32 = 0x5274_6C46;
    /// Record size in words.
    pub const WORDS: usize = 36;
    /// Record size in bytes.
    pub const SIZE: usize = Self::WORDS * 4;
    /// Bytes covered by the CRC: everything after `crc32`.
    pub const PAYLOAD: Range<usize> = offset::COUNT..Self::SIZE;

    /// An all-zero record, as left by [`clear`](Self::clear).
    pub const ZEROED: Self = Self {
        magic_number: 0,
        crc32: 0,
        count: 0,
        info: FaultInfo::from_bits(0),
        r: [0; 13],
        lr: 0,
        return_address: 0,
        xpsr: 0,
        exc_xpsr: 0,
        exc_return: 0,
        msp: 0,
        psp: 0,
        msplim: 0,
        psplim: 0,
        cfsr: 0,
        hfsr: 0,
        dfsr: 0,
        mmfar: 0,
        bfar: 0,
        afsr: 0,
        sfsr: 0,
        sfar: 0,
        rfsr: 0,
        integrity_signature: 0,
    };

    /// Zero every field.
    pub fn clear(&mut self) {
        *self = Self::ZEROED;
    }

    /// CRC-32/MPEG-2 over [`PAYLOAD`](Self::PAYLOAD).
    pub fn payload_crc(&self) -> u32 {
        let payload = self.as_bytes().get(Self::PAYLOAD).unwrap_or_default();
        crc32(CRC32_INIT, payload, CRC32_POLYNOMIAL)
    }

    /// Store the payload CRC, then the magic number.
    pub fn seal(&mut self) {
        self.crc32 = self.payload_crc();
        self.magic_number = Self::MAGIC;
    }

    /// Check the magic number and the CRC.
    pub fn check(&self) -> Result<(), RecordError> {
        if self.magic_number != Self::MAGIC {
            return Err(RecordError::BadMagic { found: self.magic_number });
        }
        let computed = self.payload_crc();
        if computed != self.crc32 {
            return Err(RecordError::CrcMismatch {
                stored: self.crc32,
                computed,
            });
        }
        Ok(())
    }

    /// `true` if the record holds a genuine, uncorrupted capture.
    pub fn occurred(&self) -> bool {
        self.check().is_ok()
    }

    /// Decode a record dumped over a debug link. Does not validate it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        Self::read_from_bytes(bytes).map_err(|_| RecordError::Length {
            actual: bytes.len(),
            expected: Self::SIZE,
        })
    }

    /// Format and content word.
    pub const fn info(&self) -> FaultInfo {
        self.info
    }

    /// The fault was taken from the Non-secure world and read through the `_NS` aliases.
    pub const fn non_secure_fault(&self) -> bool {
        self.info.contains(InfoFlags::NONSECURE_FAULT)
    }

    /// R4-R11 as stored: handler-entry values, or the additional state context.
    pub fn callee_saved(&self) -> [u32; 8] {
        let mut out = [0; 8];
        for (dst, src) in out.iter_mut().zip(self.r.iter().skip(4)) {
            *dst = *src;
        }
        out
    }

    /// Basic state context, if the stacked frame could be read.
    pub const fn stacked_frame(&self) -> Option<StackedFrame> {
        if !self.info.contains(InfoFlags::STATE_CONTEXT) {
            return None;
        }
        let [r0, r1, r2, r3, .., r12] = self.r;
        Some(StackedFrame {
            r0,
            r1,
            r2,
            r3,
            r12,
            lr: self.lr,
            return_address: self.return_address,
            xpsr: self.xpsr,
        })
    }

    /// MSPLIM/PSPLIM, if recorded.
    pub const fn stack_limits(&self) -> Option<StackLimits> {
        if !self.info.contains(InfoFlags::LIMIT_REGS) {
            return None;
        }
        Some(StackLimits {
            msplim: self.msplim,
            psplim: self.psplim,
        })
    }

    /// CFSR..AFSR, if recorded.
    pub const fn fault_status(&self) -> Option<FaultStatus> {
        if !self.info.contains(InfoFlags::FAULT_REGS) {
            return None;
        }
        Some(FaultStatus {
            cfsr: self.cfsr,
            hfsr: self.hfsr,
            dfsr: self.dfsr,
            mmfar: self.mmfar,
            bfar: self.bfar,
            afsr: self.afsr,
        })
    }

    /// SFSR/SFAR, if recorded.
    pub const fn secure_fault_status(&self) -> Option<SecureFaultStatus> {
        if !self.info.contains(InfoFlags::SECURE_FAULT_REGS) {
            return None;
        }
        Some(SecureFaultStatus {
            sfsr: self.sfsr,
            sfar: self.sfar,
        })
    }

    /// RFSR, if recorded.
    pub const fn ras_fault_status(&self) -> Option<u32> {
        if self.info.contains(InfoFlags::RAS_FAULT_REG) {
            Some(self.rfsr)
        } else {
            None
        }
    }
}

impl Default for FaultRecord {
    fn default() -> Self {
        Self::ZEROED
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> FaultRecord {
        let mut rec = FaultRecord::ZEROED;
        rec.count = 7;
        rec.info = FaultInfo::from(InfoFlags::STATE_CONTEXT | InfoFlags::FAULT_REGS);
        rec.r = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        rec.lr = 0x0800_0123;
        rec.return_address = 0x0800_0456;
        rec.xpsr = 0x0100_0000;
        rec.cfsr = scb::CFSR_BFARVALID | 1 << 9;
        rec.bfar = 0x2000_0000;
        rec.seal();
        rec
    }

    #[test]
    fn size_matches_word_count() {
        assert_eq!(core::mem::size_of::<FaultRecord>(), 144);
        assert_eq!(FaultRecord::PAYLOAD.len(), 136);
    }

    #[test]
    fn magic_spells_fltr() {
        assert_eq!(&FaultRecord::MAGIC.to_le_bytes(), b"FltR");
    }

    #[test]
    fn zeroed_record_did_not_occur() {
        assert_eq!(FaultRecord::ZEROED.check(), Err(RecordError::BadMagic { found: 0 }));
        assert!(!FaultRecord::default().occurred());
    }

    #[test]
    fn sealed_record_occurred() {
        assert_eq!(sample().check(), Ok(()));
    }

    #[test]
    fn magic_without_matching_crc_is_rejected() {
        let mut rec = sample();
        rec.count = 8;
        assert!(matches!(rec.check(), Err(RecordError::CrcMismatch { .. })));
    }

    #[test]
    fn crc_does_not_cover_magic_or_crc_fields() {
        let mut rec = sample();
        let crc = rec.payload_crc();
        rec.magic_number = 0;
        rec.crc32 = 0;
        assert_eq!(rec.payload_crc(), crc);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut rec = sample();
        rec.clear();
        assert_eq!(rec, FaultRecord::ZEROED);
        rec.clear();
        assert_eq!(rec, FaultRecord::ZEROED);
    }

    #[test]
    fn byte_image_is_little_endian_words() {
        let rec = sample();
        let bytes = rec.as_bytes();
        assert_eq!(&bytes[0..4], &FaultRecord::MAGIC.to_le_bytes());
        assert_eq!(&bytes[offset::COUNT..offset::COUNT + 4], &7u32.to_le_bytes());
        assert_eq!(&bytes[offset::R12..offset::R12 + 4], &12u32.to_le_bytes());
    }

    #[test]
    fn from_bytes_decodes_a_dump() {
        let rec = sample();
        let decoded = FaultRecord::from_bytes(rec.as_bytes()).unwrap();
        assert_eq!(decoded, rec);
        assert!(decoded.occurred());
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        let rec = sample();
        let short = &rec.as_bytes()[..100];
        assert_eq!(
            FaultRecord::from_bytes(short),
            Err(RecordError::Length {
                actual: 100,
                expected: 144
            })
        );
    }

    #[test]
    fn groups_follow_info_flags() {
        let rec = sample();
        let frame = rec.stacked_frame().unwrap();
        assert_eq!(frame.r3, 3);
        assert_eq!(frame.r12, 12);
        assert_eq!(frame.return_address, 0x0800_0456);
        let status = rec.fault_status().unwrap();
        assert!(status.bfar_valid());
        assert!(!status.mmfar_valid());
        assert!(rec.stack_limits().is_none());
        assert!(rec.secure_fault_status().is_none());
        assert!(rec.ras_fault_status().is_none());
        assert!(!rec.non_secure_fault());
    }

    #[test]
    fn hfsr_causes_are_decoded() {
        let mut rec = sample();
        rec.hfsr = scb::HFSR_VECTTBL;
        let status = rec.fault_status().unwrap();
        assert!(status.vector_table_read());
        assert!(!status.forced());

        rec.hfsr = scb::HFSR_FORCED;
        let status = rec.fault_status().unwrap();
        assert!(status.forced());
        assert!(!status.vector_table_read());
    }

    #[test]
    fn callee_saved_are_r4_to_r11() {
        assert_eq!(sample().callee_saved(), [4, 5, 6, 7, 8, 9, 10, 11]);
    }
}
