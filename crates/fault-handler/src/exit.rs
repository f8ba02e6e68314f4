//! `FaultExit`: what happens once the record is sealed.
//!
//! Defined weak. An application replaces it by defining its own strong
//! `FaultExit`:
//!
//! ```ignore
//! #[no_mangle]
//! pub unsafe extern "C" fn FaultExit() -> ! {
//!     // Runs on whatever stack faulted: keep it stack-free.
//!     loop {
//!         cortex_m::asm::bkpt();
//!     }
//! }
//! ```
//!
//! The default requests a system reset through AIRCR, keeping the priority
//! grouping where the target has one. With the `exit-halt` feature it masks
//! interrupts and spins instead, so a debugger can attach and read the record.

#[cfg(all(target_arch = "arm", target_os = "none"))]
use fault_record::{scb, Profile};

#[cfg(all(target_arch = "arm", target_os = "none"))]
use crate::save::flag;

#[cfg(all(target_arch = "arm", target_os = "none"))]
core::arch::global_asm!(
    r#"
    .syntax unified
    .thumb

    .section .text.FaultExit,"ax",%progbits
    .weak FaultExit
    .type FaultExit,%function
    .thumb_func
FaultExit:
    .if {halt}
    cpsid i
2:
    b     2b
    .else
    dsb
    ldr   r0, ={aircr}
    ldr   r1, ={reset}
    .if {fault_regs}
    @ Keep PRIGROUP.
    ldr   r2, ={prigroup}
    ldr   r3, [r0]
    ands  r3, r2
    orrs  r1, r3
    .endif
    str   r1, [r0]
    dsb
3:
    b     3b
    .endif
    .ltorg
    .size FaultExit, . - FaultExit
    "#,
    halt = const flag(cfg!(feature = "exit-halt")),
    fault_regs = const flag(Profile::CURRENT.has_fault_registers()),
    aircr = const scb::register(false, scb::AIRCR),
    reset = const scb::AIRCR_VECTKEY | scb::AIRCR_SYSRESETREQ,
    prigroup = const scb::AIRCR_PRIGROUP_MASK,
);

#[cfg(all(target_arch = "arm", target_os = "none"))]
extern "C" {
    /// The exit hook `FaultSave` branches to.
    ///
    /// # Safety
    ///
    /// Never returns. The default resets the system, dropping all state
    /// except the persisted record.
    #[link_name = "FaultExit"]
    pub fn exit_hook() -> !;
}
