//! EXC_RETURN decoding.
//!
//! On exception entry LR holds EXC_RETURN. The capture routine uses three of
//! its bits to find the stacked frame:
//!
//! | Bit | Name | Meaning |
//! |-----|------|---------|
//! | 2 | SPSEL | 0 = frame on MSP, 1 = frame on PSP |
//! | 5 | DCRS | Armv8-M: 0 = additional state context stacked below the frame |
//! | 6 | S | Security Extension: 0 = frame on a Non-secure stack |
//!
//! Decode table for a Secure build (`ns` = read through the Non-secure
//! aliases; `-` = not considered):
//!
//! | S | SPSEL | frame pointer | ns |
//! |---|-------|---------------|----|
//! | 1 | 0 | MSP | no |
//! | 1 | 1 | PSP | no |
//! | 0 | 0 | MSP_NS | yes |
//! | 0 | 1 | PSP_NS | yes |
//!
//! Every other build ignores S: SPSEL alone picks MSP or PSP and `ns` is
//! never set.

use core::fmt;

use crate::profile::Profile;

/// Which stack pointer register (or Non-secure alias) to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackPointer {
    /// MSP.
    Main,
    /// PSP.
    Process,
    /// MSP_NS, from the Secure world.
    MainNonSecure,
    /// PSP_NS, from the Secure world.
    ProcessNonSecure,
}

impl StackPointer {
    /// Pick a stack pointer by SPSEL and security view.
    pub const fn select(process: bool, non_secure: bool) -> Self {
        match (process, non_secure) {
            (false, false) => Self::Main,
            (true, false) => Self::Process,
            (false, true) => Self::MainNonSecure,
            (true, true) => Self::ProcessNonSecure,
        }
    }
}

/// Raw EXC_RETURN value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExcReturn(pub u32);

impl ExcReturn {
    /// SPSEL: frame was stacked on PSP.
    pub const SPSEL: u32 = 1 << 2;
    /// DCRS: default callee register stacking (no additional state context).
    pub const DCRS: u32 = 1 << 5;
    /// S: frame was stacked on a Secure stack.
    pub const S: u32 = 1 << 6;

    /// Frame was stacked on the process stack.
    pub const fn uses_process_stack(self) -> bool {
        self.0 & Self::SPSEL != 0
    }

    /// Frame was stacked on a Secure stack.
    pub const fn secure_stack(self) -> bool {
        self.0 & Self::S != 0
    }

    /// Only the basic frame was stacked.
    pub const fn default_callee_stacking(self) -> bool {
        self.0 & Self::DCRS != 0
    }

    /// Resolve where the stacked frame lives for a build with `profile`.
    pub const fn resolve(self, profile: Profile) -> StackingContext {
        let non_secure_alias = profile.secure && !self.secure_stack();
        StackingContext {
            frame: StackPointer::select(self.uses_process_stack(), non_secure_alias),
            non_secure_alias,
            additional_state_context: profile.has_additional_state_context() && !self.default_callee_stacking(),
        }
    }
}

impl fmt::Debug for ExcReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExcReturn({:#010X})", self.0)
    }
}

/// Outcome of decoding EXC_RETURN for one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackingContext {
    /// Register holding the address of the stacked frame.
    pub frame: StackPointer,
    /// Stack pointers and fault registers must be read through Non-secure aliases.
    pub non_secure_alias: bool,
    /// An additional state context (integrity signature, R4-R11) precedes the basic frame.
    pub additional_state_context: bool,
}

impl StackingContext {
    /// The (main, process) pair recorded as live context.
    pub const fn live_stack_pointers(self) -> (StackPointer, StackPointer) {
        (
            StackPointer::select(false, self.non_secure_alias),
            StackPointer::select(true, self.non_secure_alias),
        )
    }
}
