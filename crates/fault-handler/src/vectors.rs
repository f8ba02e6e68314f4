//! Fault vectors that branch straight into `FaultSave`.
//!
//! Each stub is a literal-pool load and a `bx`, so LR and SP arrive at the
//! capture routine as the hardware left them. Only `r0` is clobbered, and it
//! is already saved in the stacked frame. cortex-m-rt's HardFault trampoline
//! keeps the same guarantees.
//!
//! Defined for the exceptions the target actually has:
//!
//! | Vector | Targets |
//! |--------|---------|
//! | HardFault | all |
//! | MemoryManagement, BusFault, UsageFault | Armv7-M, Armv8-M Mainline |
//! | SecureFault | Armv8-M Mainline, Secure builds |

#[cfg(all(feature = "vectors", target_arch = "arm", target_os = "none"))]
use fault_record::Profile;

#[cfg(all(feature = "vectors", target_arch = "arm", target_os = "none"))]
use crate::save::flag;

#[cfg(all(feature = "vectors", target_arch = "arm", target_os = "none"))]
core::arch::global_asm!(
    r#"
    .syntax unified
    .thumb

    .macro fault_vector name
    .section .text.\name,"ax",%progbits
    .globl \name
    .type \name,%function
    .thumb_func
\name:
    ldr   r0, =FaultSave
    bx    r0
    .ltorg
    .size \name, . - \name
    .endm

    fault_vector HardFault

    .if {configurable}
    fault_vector MemoryManagement
    fault_vector BusFault
    fault_vector UsageFault
    .endif

    .if {secure_fault}
    fault_vector SecureFault
    .endif

    .purgem fault_vector
    "#,
    configurable = const flag(Profile::CURRENT.has_fault_registers()),
    secure_fault = const flag(Profile::CURRENT.reads_secure_fault_registers()),
);
