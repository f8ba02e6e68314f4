//! Persisted Cortex-M fault record.
//!
//! This crate holds everything about a captured hardware fault that can be
//! described without touching hardware, so it is fully host-testable:
//!
//! ```text
//! fault-handler (naked FaultSave, FAULT_RECORD static, FaultExit)
//!         ↓
//! fault-record (this crate: layout, seal, decode, portable capture model)
//! ```
//!
//! # Modules
//!
//! - [`record`] - the `#[repr(C)]` [`FaultRecord`] and its validity check
//! - [`info`] - the version/capability word and its [`InfoFlags`]
//! - [`crc32`] - the CRC-32/MPEG-2 engine sealing the record
//! - [`exc_return`] - EXC_RETURN decoding into a [`StackingContext`]
//! - [`profile`] - the build-time target [`Profile`]
//! - [`scb`] - System Control Block register map and masks
//! - [`capture`] - the capture state machine over a [`CpuAccess`]
//! - [`sim`] - a [`SimulatedCpu`] for host tests and emulation
//!
//! # Features
//!
//! - `std`: `impl std::error::Error for RecordError`
//! - `armv8_1m`: treat an Armv8-M Mainline target as Armv8.1-M (RFSR)
//! - `trustzone`: device implements the Security Extension
//! - `secure`: code is built for the Secure world (implies `trustzone`)
//! - `defmt`: `defmt::Format` derives
//!
//! # Example
//!
//! ```
//! use fault_record::FaultRecord;
//!
//! let mut record = FaultRecord::ZEROED;
//! assert!(!record.occurred());
//!
//! record.count = 3;
//! record.seal();
//! assert!(record.occurred());
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this register-level crate:
#![allow(clippy::doc_markdown)] // register names (CFSR, EXC_RETURN) in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod capture;
pub mod crc32;
pub mod error;
pub mod exc_return;
pub mod info;
pub mod profile;
pub mod record;
pub mod scb;
pub mod sim;

pub use capture::{capture, CaptureReport, CpuAccess};
pub use crc32::crc32;
pub use error::RecordError;
pub use exc_return::{ExcReturn, StackPointer, StackingContext};
pub use info::{FaultInfo, InfoFlags};
pub use profile::{Arch, Profile};
pub use record::FaultRecord;
pub use sim::SimulatedCpu;
