//! The record's `info` word: format version plus one bit per populated group.
//!
//! ```text
//! 31        26 25 24 23 22 21 20 19 18 17 16 15       8 7        0
//! +-----------+--+--+--+--+--+--+--+--+--+--+----------+----------+
//! | reserved  |RA|SF|FR|LR|SC|NS|TS|TZ|8M|FE|  major   |  minor   |
//! +-----------+--+--+--+--+--+--+--+--+--+--+----------+----------+
//!              \________ dynamic ________/ \__ static _/
//! ```
//!
//! Static bits describe the target the capture routine was built for; they are
//! stamped unconditionally. Dynamic bits are OR'ed in by the capture routine
//! only when the corresponding register group was actually written.

use core::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

bitflags::bitflags! {
    /// Capability and content bits of [`FaultInfo`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InfoFlags: u32 {
        /// Target has CFSR/HFSR/DFSR/MMFAR/BFAR/AFSR (not Armv6-M or Armv8-M Baseline).
        const FAULT_REGS_EXIST = 1 << 16;
        /// Target is Armv8-M or Armv8.1-M Mainline.
        const ARMV8M_MAINLINE = 1 << 17;
        /// Target implements the Security Extension.
        const TZ_ENABLED = 1 << 18;
        /// Capture routine was built for the Secure world.
        const TZ_SECURE = 1 << 19;
        /// The faulting code ran in the Non-secure world (Non-secure aliases were read).
        const NONSECURE_FAULT = 1 << 20;
        /// R0-R3, R12, LR, ReturnAddress and xPSR were copied from the stacked frame.
        const STATE_CONTEXT = 1 << 21;
        /// MSPLIM and PSPLIM were recorded.
        const LIMIT_REGS = 1 << 22;
        /// CFSR, HFSR, DFSR, MMFAR, BFAR and AFSR were recorded.
        const FAULT_REGS = 1 << 23;
        /// SFSR and SFAR were recorded.
        const SECURE_FAULT_REGS = 1 << 24;
        /// RFSR was recorded.
        const RAS_FAULT_REG = 1 << 25;
    }
}

impl InfoFlags {
    /// Bits fixed at build time by the target profile.
    pub const STATIC: Self = Self::FAULT_REGS_EXIST
        .union(Self::ARMV8M_MAINLINE)
        .union(Self::TZ_ENABLED)
        .union(Self::TZ_SECURE);

    /// Bits set by the capture routine depending on what it could collect.
    pub const DYNAMIC: Self = Self::NONSECURE_FAULT
        .union(Self::STATE_CONTEXT)
        .union(Self::LIMIT_REGS)
        .union(Self::FAULT_REGS)
        .union(Self::SECURE_FAULT_REGS)
        .union(Self::RAS_FAULT_REG);
}

/// Version and content word stored in [`FaultRecord::info`](crate::FaultRecord).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultInfo(u32);

impl FaultInfo {
    /// Record format major version.
    pub const VERSION_MAJOR: u8 = 1;
    /// Record format minor version.
    pub const VERSION_MINOR: u8 = 1;

    /// Info word of a freshly stamped record with no flags.
    pub const CURRENT_VERSION: Self = Self::new(Self::VERSION_MAJOR, Self::VERSION_MINOR, InfoFlags::empty());

    /// Build an info word from a version and flag set.
    #[allow(clippy::cast_lossless)] // `u32::from` is not const
    pub const fn new(major: u8, minor: u8, flags: InfoFlags) -> Self {
        Self((major as u32) << 8 | minor as u32 | flags.bits())
    }

    /// Wrap a raw info word.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw info word.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Format major version.
    #[allow(clippy::cast_possible_truncation)] // masked to 8 bits
    pub const fn version_major(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Format minor version.
    #[allow(clippy::cast_possible_truncation)] // masked to 8 bits
    pub const fn version_minor(self) -> u8 {
        self.0 as u8
    }

    /// Flag bits, with version and reserved bits stripped.
    pub const fn flags(self) -> InfoFlags {
        InfoFlags::from_bits_truncate(self.0)
    }

    /// `true` if every bit of `flags` is set.
    pub const fn contains(self, flags: InfoFlags) -> bool {
        self.flags().contains(flags)
    }

    /// Copy of `self` with `flags` OR'ed in.
    #[must_use]
    pub const fn with(self, flags: InfoFlags) -> Self {
        Self(self.0 | flags.bits())
    }

    /// OR `flags` into `self`.
    pub fn insert(&mut self, flags: InfoFlags) {
        *self = self.with(flags);
    }
}

impl fmt::Debug for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultInfo")
            .field("version", &format_args!("{}.{}", self.version_major(), self.version_minor()))
            .field("flags", &self.flags())
            .finish()
    }
}

impl From<InfoFlags> for FaultInfo {
    fn from(flags: InfoFlags) -> Self {
        Self::CURRENT_VERSION.with(flags)
    }
}
