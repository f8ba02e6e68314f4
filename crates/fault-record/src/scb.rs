//! System Control Block register map used by the capture routine.
//!
//! Only the registers the record cares about are listed. Offsets are relative
//! to [`SCB_BASE`] (Secure or non-TrustZone view) and [`SCB_BASE_NS`] (the
//! Non-secure alias visible from the Secure world).
//!
//! Note: non-exhaustive list of registers.

/// SCB base address (`0xE000_ED00`).
pub const SCB_BASE: u32 = 0xE000_ED00;
/// Non-secure SCB alias, accessible from the Secure world only.
pub const SCB_BASE_NS: u32 = 0xE002_ED00;

/// Application Interrupt and Reset Control Register.
pub const AIRCR: u32 = 0x00C;
/// Configurable Fault Status Register (MMFSR | BFSR << 8 | UFSR << 16).
pub const CFSR: u32 = 0x028;
/// HardFault Status Register.
pub const HFSR: u32 = 0x02C;
/// Debug Fault Status Register.
pub const DFSR: u32 = 0x030;
/// MemManage Fault Address Register.
pub const MMFAR: u32 = 0x034;
/// BusFault Address Register.
pub const BFAR: u32 = 0x038;
/// Auxiliary Fault Status Register.
pub const AFSR: u32 = 0x03C;
/// SecureFault Status Register (Armv8-M Mainline, Secure view).
pub const SFSR: u32 = 0x0E4;
/// SecureFault Address Register (Armv8-M Mainline, Secure view).
pub const SFAR: u32 = 0x0E8;
/// RAS Fault Status Register (Armv8.1-M Mainline).
pub const RFSR: u32 = 0x204;

/// MMFSR.MSTKERR: MemManage fault on exception entry stacking.
pub const CFSR_MSTKERR: u32 = 1 << 4;
/// BFSR.STKERR: BusFault on exception entry stacking.
pub const CFSR_STKERR: u32 = 1 << (8 + 4);
/// UFSR.STKOF: stack limit violation (Armv8-M Mainline).
pub const CFSR_STKOF: u32 = 1 << (16 + 4);
/// Stacking errors common to every target with a CFSR.
pub const CFSR_STACK_ERR: u32 = CFSR_MSTKERR | CFSR_STKERR;
/// MMFSR.MMARVALID: MMFAR holds a valid address.
pub const CFSR_MMARVALID: u32 = 1 << 7;
/// BFSR.BFARVALID: BFAR holds a valid address.
pub const CFSR_BFARVALID: u32 = 1 << (8 + 7);

/// HFSR.VECTTBL: BusFault on a vector table read.
pub const HFSR_VECTTBL: u32 = 1 << 1;
/// HFSR.FORCED: configurable fault escalated to HardFault.
pub const HFSR_FORCED: u32 = 1 << 30;

/// AIRCR write key.
pub const AIRCR_VECTKEY: u32 = 0x05FA << 16;
/// AIRCR.SYSRESETREQ: request a system reset.
pub const AIRCR_SYSRESETREQ: u32 = 1 << 2;
/// AIRCR.PRIGROUP: priority grouping, preserved across the reset request.
pub const AIRCR_PRIGROUP_MASK: u32 = 0x7 << 8;

/// Integrity signature at the bottom of an additional state context.
///
/// Bit 0 mirrors EXC_RETURN.FType (1 when no floating-point context was
/// stacked) and is ignored when comparing.
pub const INTEGRITY_SIGNATURE: u32 = 0xFEFA_125A;

/// `true` if `value` is an additional-state-context integrity signature.
pub const fn is_integrity_signature(value: u32) -> bool {
    value & !1 == INTEGRITY_SIGNATURE
}

/// Absolute address of an SCB register in the Secure or Non-secure view.
pub const fn register(non_secure: bool, offset: u32) -> u32 {
    let base = if non_secure { SCB_BASE_NS } else { SCB_BASE };
    base.wrapping_add(offset)
}
