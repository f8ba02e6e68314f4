//! `FaultSave`: the capture routine.
//!
//! A prologue-free assembly routine entered by a plain branch from a fault
//! vector, with LR still holding EXC_RETURN and SP untouched. It never returns:
//! it ends by branching to `FaultExit`.
//!
//! The routine follows [`fault_record::capture::capture`] step for step. Target
//! variation is resolved by the assembler: every optional block sits behind an
//! `.if` fed from [`Profile::CURRENT`], and every record offset is an operand
//! taken from [`fault_record::record::offset`], never a literal.
//!
//! Register use:
//!
//! - `r6`: address of the stacked frame, advanced while copying
//! - `r7` bit 0: read through the Non-secure aliases
//! - `r7` bit 1: stacked frame is not trustworthy
//!
//! The common path only uses Armv6-M instructions so the same text serves
//! every target. The Secure blocks need the `8msecext` target feature.

#[cfg(all(target_arch = "arm", target_os = "none"))]
use fault_record::record::{offset, FaultRecord};
#[cfg(all(target_arch = "arm", target_os = "none"))]
use fault_record::{crc32, scb, InfoFlags, Profile};

#[cfg(all(target_arch = "arm", target_os = "none"))]
use crate::storage::FAULT_RECORD;

/// Assembler truth value.
#[cfg_attr(not(all(target_arch = "arm", target_os = "none")), allow(dead_code))]
pub(crate) const fn flag(set: bool) -> u32 {
    if set {
        1
    } else {
        0
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
core::arch::global_asm!(
    r#"
    .syntax unified
    .thumb

    .macro fault_info_or mask
        ldr   r0, ={rec}+{o_info}
        ldr   r1, [r0]
        ldr   r2, =\mask
        orrs  r1, r2
        str   r1, [r0]
    .endm

    .section .text.FaultSave,"ax",%progbits
    .globl FaultSave
    .type FaultSave,%function
    .thumb_func
FaultSave:
    @ Keep count across the wipe.
    ldr   r2, ={rec}+{o_count}
    ldr   r3, [r2]

    @ Wipe the whole record.
    movs  r0, #0
    ldr   r1, ={rec}
    movs  r2, #{words}
2:
    stm   r1!, {{r0}}
    subs  r2, r2, #1
    bne   2b

    @ count + 1, then the static info word right behind it.
    ldr   r2, ={rec}+{o_count}
    adds  r3, r3, #1
    stm   r2!, {{r3}}
    ldr   r0, ={info_static}
    str   r0, [r2]

    @ R4-R11 into the record; from here on they are scratch.
    ldr   r2, ={rec}+{o_r4}
    stm   r2!, {{r4-r7}}
    mov   r4, r8
    mov   r5, r9
    mov   r6, r10
    mov   r7, r11
    stm   r2!, {{r4-r7}}

    @ Find the stacked frame.
    movs  r6, #0
    movs  r7, #0
    mov   r0, lr
    lsrs  r0, r0, #3            @ SPSEL -> C
    bcc   4f
    .if {secure}
    mov   r0, lr
    lsrs  r0, r0, #7            @ S -> C
    bcs   3f
    mrs   r6, psp_ns
    movs  r7, #1
    b     6f
3:
    .endif
    mrs   r6, psp
    b     6f
4:
    .if {secure}
    mov   r0, lr
    lsrs  r0, r0, #7            @ S -> C
    bcs   5f
    mrs   r6, msp_ns
    movs  r7, #1
    b     6f
5:
    .endif
    mrs   r6, msp
6:

    .if {secure}
    lsrs  r0, r7, #1
    bcc   7f
    fault_info_or {f_nonsecure}
7:
    .endif

    @ Frame is unusable if SP is zero or stacking faulted.
    cmp   r6, #0
    bne   8f
    movs  r3, #2
    orrs  r7, r3
    b     9f
8:
    .if {fault_regs}
    ldr   r2, ={cfsr}
    .if {secure}
    lsrs  r0, r7, #1
    bcc   22f
    ldr   r2, ={cfsr_ns}
22:
    .endif
    ldr   r0, [r2]
    ldr   r1, ={stack_err}
    ands  r0, r1
    beq   9f
    movs  r3, #2
    orrs  r7, r3
    .endif
9:

    @ Stacked context.
    lsrs  r0, r7, #2            @ invalid -> C
    bcs   25f
    .if {armv8}
    mov   r0, lr
    lsrs  r0, r0, #6            @ DCRS -> C
    bcs   23f
    @ Integrity signature, reserved, R4-R11.
    ldm   r6!, {{r0, r1}}
    ldr   r5, ={rec}+{o_signature}
    str   r0, [r5]
    ldr   r5, ={rec}+{o_r4}
    ldm   r6!, {{r0-r3}}
    stm   r5!, {{r0-r3}}
    ldm   r6!, {{r0-r3}}
    stm   r5!, {{r0-r3}}
23:
    .endif
    @ R0-R3, then R12, LR, ReturnAddress, xPSR.
    ldr   r5, ={rec}+{o_r0}
    ldm   r6!, {{r0-r3}}
    stm   r5!, {{r0-r3}}
    ldr   r5, ={rec}+{o_r12}
    ldm   r6!, {{r0-r3}}
    stm   r5!, {{r0-r3}}
    fault_info_or {f_state}
25:

    @ Live context: xPSR, EXC_RETURN, MSP, PSP.
    mrs   r0, xpsr
    mov   r1, lr
    .if {secure}
    lsrs  r4, r7, #1
    bcc   26f
    mrs   r2, msp_ns
    mrs   r3, psp_ns
    b     27f
26:
    .endif
    mrs   r2, msp
    mrs   r3, psp
27:
    ldr   r5, ={rec}+{o_exc_xpsr}
    stm   r5!, {{r0-r3}}

    @ Stack limits; r5 now points at msplim.
    .if {armv8}
    .if {secure}
    lsrs  r4, r7, #1
    bcc   28f
    .if {ns_limits}
    mrs   r0, msplim_ns
    mrs   r1, psplim_ns
    b     29f
    .else
    b     32f
    .endif
28:
    .endif
    mrs   r0, msplim
    mrs   r1, psplim
29:
    stm   r5!, {{r0, r1}}
    fault_info_or {f_limits}
32:
    .endif

    @ Fault status registers.
    .if {fault_regs}
    ldr   r4, ={scb_base}
    .if {secure}
    lsrs  r0, r7, #1
    bcc   33f
    ldr   r4, ={scb_base_ns}
33:
    .endif
    ldr   r5, ={rec}+{o_cfsr}
    ldr   r0, [r4, #{r_cfsr}]
    ldr   r1, [r4, #{r_hfsr}]
    ldr   r2, [r4, #{r_dfsr}]
    ldr   r3, [r4, #{r_mmfar}]
    stm   r5!, {{r0-r3}}
    ldr   r0, [r4, #{r_bfar}]
    ldr   r1, [r4, #{r_afsr}]
    stm   r5!, {{r0, r1}}
    fault_info_or {f_fault}

    .if {ras}
    ldr   r5, ={rec}+{o_rfsr}
    ldr   r0, [r4, #{r_rfsr}]
    str   r0, [r5]
    fault_info_or {f_ras}
    .endif

    .if {secure_regs}
    @ SFSR/SFAR only exist in the Secure SCB.
    ldr   r4, ={scb_base}
    ldr   r5, ={rec}+{o_sfsr}
    ldr   r0, [r4, #{r_sfsr}]
    ldr   r1, [r4, #{r_sfar}]
    stm   r5!, {{r0, r1}}
    fault_info_or {f_secure}
    .endif
    .endif

    @ Seal: CRC-32/MPEG-2 over count..end, then the magic number.
    ldr   r0, ={crc_init}
    ldr   r1, ={rec}+{o_count}
    ldr   r2, ={crc_len}
    ldr   r3, ={crc_poly}
34:
    ldrb  r5, [r1]
    lsls  r5, r5, #24
    eors  r0, r0, r5
    movs  r4, #8
35:
    lsls  r0, r0, #1
    bcc   36f
    eors  r0, r0, r3
36:
    subs  r4, r4, #1
    bne   35b
    adds  r1, r1, #1
    subs  r2, r2, #1
    bne   34b
    ldr   r2, ={rec}+{o_crc}
    str   r0, [r2]
    ldr   r2, ={rec}+{o_magic}
    ldr   r0, ={magic}
    str   r0, [r2]
    dsb

    @ R4-R7 back from the record; R8-R11 were never touched.
    ldr   r0, ={rec}+{o_r4}
    ldm   r0!, {{r4-r7}}
    .if {armv8}
    @ Hardware cleared R4-R7 when it stacked an additional state context.
    ldr   r0, ={rec}+{o_signature}
    ldr   r2, [r0]
    movs  r1, #1
    bics  r2, r1                @ ignore FType
    ldr   r1, ={signature}
    cmp   r2, r1
    bne   37f
    movs  r4, #0
    movs  r5, #0
    movs  r6, #0
    movs  r7, #0
37:
    .endif

    ldr   r0, =FaultExit
    bx    r0
    .ltorg
    .size FaultSave, . - FaultSave
    .purgem fault_info_or
    "#,
    rec = sym FAULT_RECORD,
    words = const FaultRecord::WORDS,
    o_magic = const offset::MAGIC_NUMBER,
    o_crc = const offset::CRC32,
    o_count = const offset::COUNT,
    o_info = const offset::INFO,
    o_r0 = const offset::R0,
    o_r4 = const offset::R4,
    o_r12 = const offset::R12,
    o_exc_xpsr = const offset::EXC_XPSR,
    o_cfsr = const offset::CFSR,
    o_sfsr = const offset::SFSR,
    o_rfsr = const offset::RFSR,
    o_signature = const offset::INTEGRITY_SIGNATURE,
    info_static = const Profile::CURRENT.static_info().bits(),
    f_nonsecure = const InfoFlags::NONSECURE_FAULT.bits(),
    f_state = const InfoFlags::STATE_CONTEXT.bits(),
    f_limits = const InfoFlags::LIMIT_REGS.bits(),
    f_fault = const InfoFlags::FAULT_REGS.bits(),
    f_secure = const InfoFlags::SECURE_FAULT_REGS.bits(),
    f_ras = const InfoFlags::RAS_FAULT_REG.bits(),
    secure = const flag(Profile::CURRENT.secure),
    armv8 = const flag(Profile::CURRENT.has_additional_state_context()),
    ns_limits = const flag(Profile::CURRENT.has_nonsecure_stack_limits()),
    fault_regs = const flag(Profile::CURRENT.has_fault_registers()),
    ras = const flag(Profile::CURRENT.has_ras_fault_register()),
    secure_regs = const flag(Profile::CURRENT.reads_secure_fault_registers()),
    stack_err = const Profile::CURRENT.stack_error_mask(),
    cfsr = const scb::register(false, scb::CFSR),
    cfsr_ns = const scb::register(true, scb::CFSR),
    scb_base = const scb::SCB_BASE,
    scb_base_ns = const scb::SCB_BASE_NS,
    r_cfsr = const scb::CFSR,
    r_hfsr = const scb::HFSR,
    r_dfsr = const scb::DFSR,
    r_mmfar = const scb::MMFAR,
    r_bfar = const scb::BFAR,
    r_afsr = const scb::AFSR,
    r_sfsr = const scb::SFSR,
    r_sfar = const scb::SFAR,
    r_rfsr = const scb::RFSR,
    crc_init = const crc32::CRC32_INIT,
    crc_poly = const crc32::CRC32_POLYNOMIAL,
    crc_len = const FaultRecord::SIZE - offset::COUNT,
    magic = const FaultRecord::MAGIC,
    signature = const scb::INTEGRITY_SIGNATURE,
);

#[cfg(all(target_arch = "arm", target_os = "none"))]
extern "C" {
    /// The capture routine.
    ///
    /// # Safety
    ///
    /// Only reachable from a fault vector: LR must hold EXC_RETURN and SP must
    /// be the one the hardware stacked onto. Never call it from normal code.
    #[link_name = "FaultSave"]
    pub fn save() -> !;
}
