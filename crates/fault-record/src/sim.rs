//! Simulated Cortex-M core for host tests.
//!
//! Registers are plain fields; memory is a sparse word map. Unmapped reads
//! return zero and are still logged, so tests can assert which addresses the
//! capture touched.

use heapless::{LinearMap, Vec};

use crate::capture::{CpuAccess, ADDITIONAL_CONTEXT_SIZE};
use crate::exc_return::StackPointer;
use crate::scb;

/// Words of simulated memory.
pub const MEMORY_WORDS: usize = 64;
/// Reads kept in the access log.
pub const READ_LOG: usize = 64;

/// Register file and memory of a core that just took a fault.
#[derive(Debug, Clone)]
pub struct SimulatedCpu {
    exc_return: u32,
    xpsr: u32,
    callee_saved: [u32; 8],
    stack_pointers: [u32; 4],
    stack_limits: [u32; 4],
    memory: LinearMap<u32, u32, MEMORY_WORDS>,
    reads: Vec<u32, READ_LOG>,
    dropped_writes: usize,
    barriers: usize,
}

const fn slot(sp: StackPointer) -> usize {
    match sp {
        StackPointer::Main => 0,
        StackPointer::Process => 1,
        StackPointer::MainNonSecure => 2,
        StackPointer::ProcessNonSecure => 3,
    }
}

impl SimulatedCpu {
    /// Core that entered the fault handler with `exc_return` in LR.
    pub fn new(exc_return: u32) -> Self {
        Self {
            exc_return,
            xpsr: 0x0100_0003,
            callee_saved: [0; 8],
            stack_pointers: [0; 4],
            stack_limits: [0; 4],
            memory: LinearMap::new(),
            reads: Vec::new(),
            dropped_writes: 0,
            barriers: 0,
        }
    }

    /// Set xPSR inside the handler.
    #[must_use]
    pub fn with_xpsr(mut self, xpsr: u32) -> Self {
        self.xpsr = xpsr;
        self
    }

    /// Set R4-R11 at handler entry.
    #[must_use]
    pub fn with_callee_saved(mut self, regs: [u32; 8]) -> Self {
        self.callee_saved = regs;
        self
    }

    /// Set a stack pointer register.
    #[must_use]
    pub fn with_stack_pointer(mut self, sp: StackPointer, value: u32) -> Self {
        if let Some(reg) = self.stack_pointers.get_mut(slot(sp)) {
            *reg = value;
        }
        self
    }

    /// Set a stack limit register.
    #[must_use]
    pub fn with_stack_limit(mut self, sp: StackPointer, value: u32) -> Self {
        if let Some(reg) = self.stack_limits.get_mut(slot(sp)) {
            *reg = value;
        }
        self
    }

    /// Place a basic frame (R0-R3, R12, LR, ReturnAddress, xPSR) at `address`.
    #[must_use]
    pub fn with_frame(mut self, address: u32, frame: [u32; 8]) -> Self {
        self.write_block(address, &frame);
        self
    }

    /// Place an additional state context at `address`, followed by `frame`.
    #[must_use]
    pub fn with_additional_context(mut self, address: u32, signature: u32, callee: [u32; 8], frame: [u32; 8]) -> Self {
        self.write_word(address, signature);
        self.write_word(address.wrapping_add(4), 0);
        self.write_block(address.wrapping_add(8), &callee);
        self.write_block(address.wrapping_add(ADDITIONAL_CONTEXT_SIZE), &frame);
        self
    }

    /// Set an SCB register in the Secure (or only) view or the Non-secure alias.
    #[must_use]
    pub fn with_scb(mut self, non_secure: bool, offset: u32, value: u32) -> Self {
        self.write_word(scb::register(non_secure, offset), value);
        self
    }

    /// Store one word of memory.
    pub fn write_word(&mut self, address: u32, value: u32) {
        if self.memory.insert(address, value).is_err() {
            self.dropped_writes = self.dropped_writes.saturating_add(1);
        }
    }

    fn write_block(&mut self, address: u32, words: &[u32]) {
        let mut at = address;
        for word in words {
            self.write_word(at, *word);
            at = at.wrapping_add(4);
        }
    }

    /// Every address read so far, oldest first.
    pub fn reads(&self) -> &[u32] {
        &self.reads
    }

    /// `true` if `address` was read.
    pub fn was_read(&self, address: u32) -> bool {
        self.reads.contains(&address)
    }

    /// Writes lost because memory was full.
    pub fn dropped_writes(&self) -> usize {
        self.dropped_writes
    }

    /// Number of DSBs executed.
    pub fn barriers(&self) -> usize {
        self.barriers
    }
}

impl CpuAccess for SimulatedCpu {
    fn exc_return(&self) -> u32 {
        self.exc_return
    }

    fn xpsr(&self) -> u32 {
        self.xpsr
    }

    fn callee_saved(&self) -> [u32; 8] {
        self.callee_saved
    }

    fn stack_pointer(&self, sp: StackPointer) -> u32 {
        self.stack_pointers.get(slot(sp)).copied().unwrap_or(0)
    }

    fn stack_limit(&self, sp: StackPointer) -> u32 {
        self.stack_limits.get(slot(sp)).copied().unwrap_or(0)
    }

    fn read_word(&mut self, address: u32) -> u32 {
        let _ = self.reads.push(address);
        self.memory.get(&address).copied().unwrap_or(0)
    }

    fn data_synchronization_barrier(&mut self) {
        self.barriers = self.barriers.saturating_add(1);
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_reads_are_zero_and_logged() {
        let mut cpu = SimulatedCpu::new(0xFFFF_FFF9);
        assert_eq!(cpu.read_word(0x1234), 0);
        assert!(cpu.was_read(0x1234));
    }

    #[test]
    fn frame_is_laid_out_upwards() {
        let mut cpu = SimulatedCpu::new(0xFFFF_FFF9).with_frame(0x100, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(cpu.read_word(0x100), 1);
        assert_eq!(cpu.read_word(0x11C), 8);
    }

    #[test]
    fn additional_context_precedes_frame() {
        let mut cpu = SimulatedCpu::new(0xFFFF_FFBC).with_additional_context(0x200, 0xFEFA_125B, [4; 8], [9; 8]);
        assert_eq!(cpu.read_word(0x200), 0xFEFA_125B);
        assert_eq!(cpu.read_word(0x208), 4);
        assert_eq!(cpu.read_word(0x228), 9);
    }

    #[test]
    fn memory_overflow_is_counted() {
        let mut cpu = SimulatedCpu::new(0);
        for i in 0..=MEMORY_WORDS as u32 {
            cpu.write_word(i * 4, i);
        }
        assert_eq!(cpu.dropped_writes(), 1);
    }
}
