//! Build-time target profile.
//!
//! The capture routine is specialised once per binary: which optional register
//! groups exist, whether Secure/Non-secure aliases have to be considered and
//! which CFSR bits flag a stacking failure are all known when the firmware is
//! compiled. [`Profile::CURRENT`] is that resolution for the crate being built;
//! the other constructors exist so host tests can exercise every variant.
//!
//! | Arch | fault regs | stack limits | RFSR | SFSR/SFAR (Secure) |
//! |------|------------|--------------|------|--------------------|
//! | Armv6-M | – | – | – | – |
//! | Armv7-M | yes | – | – | – |
//! | Armv8-M Baseline | – | yes | – | – |
//! | Armv8-M Mainline | yes | yes | – | yes |
//! | Armv8.1-M Mainline | yes | yes | yes | yes |

use crate::info::{FaultInfo, InfoFlags};
use crate::scb;

/// M-profile architecture variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Arch {
    /// Armv6-M (Cortex-M0/M0+/M1).
    V6M,
    /// Armv7-M and Armv7E-M (Cortex-M3/M4/M7).
    V7M,
    /// Armv8-M Baseline (Cortex-M23).
    V8MBaseline,
    /// Armv8-M Mainline (Cortex-M33/M35P).
    V8MMainline,
    /// Armv8.1-M Mainline (Cortex-M55/M85).
    V81MMainline,
}

/// Capabilities the capture routine is specialised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Profile {
    /// Architecture variant.
    pub arch: Arch,
    /// Device implements the Security Extension.
    pub trustzone: bool,
    /// Capture code runs in the Secure world.
    pub secure: bool,
}

impl Profile {
    /// Profile of the target this crate is compiled for.
    pub const CURRENT: Self = Self::new(current_arch(), cfg!(feature = "trustzone"), cfg!(feature = "secure"));

    /// Every profile the capture routine can be built for.
    pub const ALL: [Self; 11] = [
        Self::new(Arch::V6M, false, false),
        Self::new(Arch::V7M, false, false),
        Self::new(Arch::V8MBaseline, false, false),
        Self::new(Arch::V8MMainline, false, false),
        Self::new(Arch::V81MMainline, false, false),
        Self::new(Arch::V8MBaseline, true, false),
        Self::new(Arch::V8MMainline, true, false),
        Self::new(Arch::V81MMainline, true, false),
        Self::new(Arch::V8MBaseline, true, true),
        Self::new(Arch::V8MMainline, true, true),
        Self::new(Arch::V81MMainline, true, true),
    ];

    /// Build a profile. `secure` implies `trustzone`.
    pub const fn new(arch: Arch, trustzone: bool, secure: bool) -> Self {
        Self {
            arch,
            trustzone: trustzone || secure,
            secure,
        }
    }

    /// Armv8-M or Armv8.1-M, Baseline or Mainline.
    pub const fn is_armv8(self) -> bool {
        matches!(self.arch, Arch::V8MBaseline | Arch::V8MMainline | Arch::V81MMainline)
    }

    /// Armv8-M or Armv8.1-M Mainline.
    pub const fn is_armv8_mainline(self) -> bool {
        matches!(self.arch, Arch::V8MMainline | Arch::V81MMainline)
    }

    /// CFSR, HFSR, DFSR, MMFAR, BFAR and AFSR are implemented.
    pub const fn has_fault_registers(self) -> bool {
        !matches!(self.arch, Arch::V6M | Arch::V8MBaseline)
    }

    /// MSPLIM and PSPLIM are implemented.
    pub const fn has_stack_limits(self) -> bool {
        self.is_armv8()
    }

    /// The Non-secure stack limit aliases exist (Baseline has none).
    pub const fn has_nonsecure_stack_limits(self) -> bool {
        self.is_armv8_mainline()
    }

    /// RFSR is implemented.
    pub const fn has_ras_fault_register(self) -> bool {
        matches!(self.arch, Arch::V81MMainline)
    }

    /// SFSR and SFAR are read (Secure Mainline builds only).
    pub const fn reads_secure_fault_registers(self) -> bool {
        self.is_armv8_mainline() && self.secure
    }

    /// EXC_RETURN.DCRS is meaningful and an additional state context may be stacked.
    pub const fn has_additional_state_context(self) -> bool {
        self.is_armv8()
    }

    /// CFSR bits that mark the stacked frame as unusable.
    pub const fn stack_error_mask(self) -> u32 {
        if self.is_armv8_mainline() {
            scb::CFSR_STACK_ERR | scb::CFSR_STKOF
        } else {
            scb::CFSR_STACK_ERR
        }
    }

    /// Static capability bits of the `info` word.
    pub const fn static_flags(self) -> InfoFlags {
        let mut flags = InfoFlags::empty();
        if self.has_fault_registers() {
            flags = flags.union(InfoFlags::FAULT_REGS_EXIST);
        }
        if self.is_armv8_mainline() {
            flags = flags.union(InfoFlags::ARMV8M_MAINLINE);
        }
        if self.trustzone {
            flags = flags.union(InfoFlags::TZ_ENABLED);
        }
        if self.secure {
            flags = flags.union(InfoFlags::TZ_SECURE);
        }
        flags
    }

    /// Info word stamped at the start of every capture.
    pub const fn static_info(self) -> FaultInfo {
        FaultInfo::CURRENT_VERSION.with(self.static_flags())
    }
}

const fn current_arch() -> Arch {
    if cfg!(fault_arch = "armv6m") {
        Arch::V6M
    } else if cfg!(fault_arch = "armv8m_base") {
        Arch::V8MBaseline
    } else if cfg!(fault_arch = "armv8m_main") {
        if cfg!(feature = "armv8_1m") {
            Arch::V81MMainline
        } else {
            Arch::V8MMainline
        }
    } else {
        Arch::V7M
    }
}

const _: () = assert!(
    !Profile::CURRENT.trustzone || Profile::CURRENT.is_armv8(),
    "the `trustzone` and `secure` features require an Armv8-M target"
);
const _: () = assert!(
    !cfg!(feature = "armv8_1m") || Profile::CURRENT.is_armv8_mainline(),
    "the `armv8_1m` feature requires a thumbv8m.main target"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_implies_trustzone() {
        let p = Profile::new(Arch::V8MMainline, false, true);
        assert!(p.trustzone);
        assert!(p.static_flags().contains(InfoFlags::TZ_ENABLED | InfoFlags::TZ_SECURE));
    }

    #[test]
    fn armv6m_has_no_optional_groups() {
        let p = Profile::new(Arch::V6M, false, false);
        assert!(!p.has_fault_registers());
        assert!(!p.has_stack_limits());
        assert!(!p.has_ras_fault_register());
        assert_eq!(p.static_flags(), InfoFlags::empty());
    }

    #[test]
    fn armv7m_reports_fault_registers_only() {
        let p = Profile::new(Arch::V7M, false, false);
        assert_eq!(p.static_flags(), InfoFlags::FAULT_REGS_EXIST);
        assert_eq!(p.stack_error_mask(), scb::CFSR_STACK_ERR);
    }

    #[test]
    fn baseline_has_limits_but_no_fault_registers() {
        let p = Profile::new(Arch::V8MBaseline, true, true);
        assert!(p.has_stack_limits());
        assert!(!p.has_nonsecure_stack_limits());
        assert!(!p.has_fault_registers());
        assert!(!p.reads_secure_fault_registers());
    }

    #[test]
    fn mainline_stack_error_mask_includes_stkof() {
        let p = Profile::new(Arch::V8MMainline, false, false);
        assert_ne!(p.stack_error_mask() & scb::CFSR_STKOF, 0);
    }

    #[test]
    fn only_secure_mainline_reads_sfsr() {
        for p in Profile::ALL {
            assert_eq!(p.reads_secure_fault_registers(), p.secure && p.is_armv8_mainline(), "{p:?}");
        }
    }

    #[test]
    fn static_info_carries_version() {
        for p in Profile::ALL {
            let info = p.static_info();
            assert_eq!(info.version_major(), FaultInfo::VERSION_MAJOR);
            assert!(InfoFlags::STATIC.contains(info.flags()));
        }
    }

    #[test]
    fn host_profile_is_valid() {
        assert!(Profile::ALL.contains(&Profile::CURRENT));
    }
}
