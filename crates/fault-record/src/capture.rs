//! Capture state machine over an abstract CPU.
//!
//! [`capture`] performs the same steps, in the same order, as the assembly
//! `FaultSave` routine in `fault-handler`, but against a [`CpuAccess`]
//! implementation instead of live registers. Host tests drive it with a
//! [`SimulatedCpu`](crate::SimulatedCpu); the assembly is checked against it
//! step by step.
//!
//! Steps:
//!
//! 1. keep `count`, wipe the record, store `count + 1`
//! 2. stamp the static `info` bits
//! 3. save R4-R11 (the routine uses them as scratch)
//! 4. decode EXC_RETURN, flag a Non-secure fault
//! 5. validate the stack pointer (non-zero, no stacking error in CFSR)
//! 6. copy the additional state context and the basic frame
//! 7. live xPSR, EXC_RETURN, MSP, PSP
//! 8. stack limits, fault status, RAS, secure fault status
//! 9. seal, barrier
//! 10. work out R4-R11 as the exit hook will see them

use crate::exc_return::{ExcReturn, StackPointer, StackingContext};
use crate::info::InfoFlags;
use crate::profile::Profile;
use crate::record::FaultRecord;
use crate::scb;

/// Bytes from the start of an additional state context to the basic frame:
/// integrity signature, reserved word, R4-R11.
pub const ADDITIONAL_CONTEXT_SIZE: u32 = 10 * 4;

/// Register and memory access needed by [`capture`].
pub trait CpuAccess {
    /// LR on handler entry.
    fn exc_return(&self) -> u32;

    /// xPSR inside the handler.
    fn xpsr(&self) -> u32;

    /// R4-R11 on handler entry.
    fn callee_saved(&self) -> [u32; 8];

    /// Current value of a stack pointer register.
    fn stack_pointer(&self, sp: StackPointer) -> u32;

    /// Limit register paired with a stack pointer (MSPLIM, PSPLIM, `_NS`).
    fn stack_limit(&self, sp: StackPointer) -> u32;

    /// Read a word of stack or SCB memory.
    fn read_word(&mut self, address: u32) -> u32;

    /// DSB.
    fn data_synchronization_barrier(&mut self) {}
}

/// What a capture found out besides what it wrote to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureReport {
    /// Decoded EXC_RETURN.
    pub context: StackingContext,
    /// The stacked frame was considered readable.
    pub stack_valid: bool,
    /// R4-R11 as handed to the exit hook.
    pub exit_callee_saved: [u32; 8],
}

/// Capture `cpu` into `record` for a build with `profile`.
pub fn capture<C: CpuAccess + ?Sized>(record: &mut FaultRecord, cpu: &mut C, profile: Profile) -> CaptureReport {
    let count = record.count;
    record.clear();
    record.count = count.wrapping_add(1);
    record.info = profile.static_info();

    let entry = cpu.callee_saved();
    for (dst, src) in record.r.iter_mut().skip(4).zip(entry) {
        *dst = src;
    }

    let exc_return = cpu.exc_return();
    let context = ExcReturn(exc_return).resolve(profile);
    if context.non_secure_alias {
        record.info.insert(InfoFlags::NONSECURE_FAULT);
    }

    let sp = cpu.stack_pointer(context.frame);
    let stack_valid = sp != 0 && !stacking_error(cpu, profile, context.non_secure_alias);

    if stack_valid {
        copy_stacked_context(record, cpu, context, sp);
    }

    let (main, process) = context.live_stack_pointers();
    record.exc_xpsr = cpu.xpsr();
    record.exc_return = exc_return;
    record.msp = cpu.stack_pointer(main);
    record.psp = cpu.stack_pointer(process);

    // MSPLIM_NS/PSPLIM_NS do not exist on Baseline.
    if profile.has_stack_limits() && (!context.non_secure_alias || profile.has_nonsecure_stack_limits()) {
        record.msplim = cpu.stack_limit(main);
        record.psplim = cpu.stack_limit(process);
        record.info.insert(InfoFlags::LIMIT_REGS);
    }

    if profile.has_fault_registers() {
        copy_fault_registers(record, cpu, profile, context.non_secure_alias);
    }

    record.seal();
    cpu.data_synchronization_barrier();

    CaptureReport {
        context,
        stack_valid,
        exit_callee_saved: exit_callee_saved(record, profile, entry),
    }
}

fn stacking_error<C: CpuAccess + ?Sized>(cpu: &mut C, profile: Profile, non_secure: bool) -> bool {
    if !profile.has_fault_registers() {
        return false;
    }
    cpu.read_word(scb::register(non_secure, scb::CFSR)) & profile.stack_error_mask() != 0
}

fn copy_stacked_context<C: CpuAccess + ?Sized>(record: &mut FaultRecord, cpu: &mut C, context: StackingContext, sp: u32) {
    let mut frame = sp;
    if context.additional_state_context {
        let [signature, _reserved, callee @ ..] = read_block::<C, 10>(cpu, frame);
        record.integrity_signature = signature;
        for (dst, src) in record.r.iter_mut().skip(4).zip(callee) {
            *dst = src;
        }
        frame = frame.wrapping_add(ADDITIONAL_CONTEXT_SIZE);
    }

    let [r0, r1, r2, r3, r12, lr, return_address, xpsr] = read_block::<C, 8>(cpu, frame);
    let [d0, d1, d2, d3, .., d12] = &mut record.r;
    *d0 = r0;
    *d1 = r1;
    *d2 = r2;
    *d3 = r3;
    *d12 = r12;
    record.lr = lr;
    record.return_address = return_address;
    record.xpsr = xpsr;
    record.info.insert(InfoFlags::STATE_CONTEXT);
}

fn copy_fault_registers<C: CpuAccess + ?Sized>(record: &mut FaultRecord, cpu: &mut C, profile: Profile, non_secure: bool) {
    let mut read = |offset| cpu.read_word(scb::register(non_secure, offset));
    record.cfsr = read(scb::CFSR);
    record.hfsr = read(scb::HFSR);
    record.dfsr = read(scb::DFSR);
    record.mmfar = read(scb::MMFAR);
    record.bfar = read(scb::BFAR);
    record.afsr = read(scb::AFSR);
    record.info.insert(InfoFlags::FAULT_REGS);

    if profile.has_ras_fault_register() {
        record.rfsr = read(scb::RFSR);
        record.info.insert(InfoFlags::RAS_FAULT_REG);
    }

    // SFSR/SFAR only exist in the Secure SCB.
    if profile.reads_secure_fault_registers() {
        record.sfsr = cpu.read_word(scb::register(false, scb::SFSR));
        record.sfar = cpu.read_word(scb::register(false, scb::SFAR));
        record.info.insert(InfoFlags::SECURE_FAULT_REGS);
    }
}

/// R4-R7 are reloaded from the record. A matching integrity signature means
/// an additional state context was stacked and the hardware had already
/// cleared R4-R7, so they are cleared again. Without it the reloaded values
/// are the faulting code's own and are kept. R8-R11 are never touched.
fn exit_callee_saved(record: &FaultRecord, profile: Profile, entry: [u32; 8]) -> [u32; 8] {
    let cleared = profile.has_additional_state_context() && scb::is_integrity_signature(record.integrity_signature);
    let mut regs = entry;
    for (dst, src) in regs.iter_mut().zip(record.callee_saved()).take(4) {
        *dst = if cleared { 0 } else { src };
    }
    regs
}

fn read_block<C: CpuAccess + ?Sized, const N: usize>(cpu: &mut C, base: u32) -> [u32; N] {
    let mut out = [0; N];
    let mut address = base;
    for word in &mut out {
        *word = cpu.read_word(address);
        address = address.wrapping_add(4);
    }
    out
}
