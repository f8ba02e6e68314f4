//! Cortex-M fault capture.
//!
//! On a fault, the vectors defined here branch to `FaultSave`, a stack-free
//! assembly routine that snapshots the faulting context into [`FAULT_RECORD`],
//! seals it with a CRC and hands over to the `FaultExit` hook. After the reset
//! that follows, the application reads the record back with
//! [`previous_fault`] or [`report_previous_fault`].
//!
//! ```text
//! HardFault / MemManage / BusFault / UsageFault / SecureFault
//!         ↓
//! FaultSave (save.rs: naked, no stack)  →  FAULT_RECORD (.uninit)
//!         ↓
//! FaultExit (exit.rs: weak, default = system reset)
//!         ↓
//! boot: report_previous_fault()  →  clear()
//! ```
//!
//! The record layout, seal and decoding live in `fault-record`; this crate
//! owns the static, the assembly and the normal-execution API.
//!
//! # Features
//!
//! - `vectors` (default): define the fault vectors. Disable to route them
//!   yourself, e.g. from a `#[cortex_m_rt::exception]` handler that branches
//!   to `FaultSave`.
//! - `exit-halt`: default `FaultExit` halts instead of resetting
//! - `armv8_1m`, `trustzone`, `secure`: target profile, see `fault-record`
//! - `defmt`: log the boot-time report
//! - `hardware`: runtime stack for the `fault_demo` binary
//!
//! Secure builds (`secure`) read the Non-secure stack pointers with `mrs`
//! on `*_NS` registers, which needs the `+8msecext` target feature:
//! `-C target-feature=+8msecext`.
//!
//! # Example
//!
//! ```no_run
//! # fn main() {
//! match fault_handler::report_previous_fault() {
//!     Ok(record) => {
//!         // Persist or upload `record`, then start over.
//!         let _ = record.count;
//!         fault_handler::clear();
//!     }
//!     Err(_) => {} // first boot, or nothing to report
//! }
//! # }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::doc_markdown)] // HardFault, EXC_RETURN etc. in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod boot;
pub mod exit;
pub mod save;
pub mod storage;
pub mod vectors;

pub use boot::{report_previous_fault, FaultSummary};
pub use storage::{capture_with, clear, occurred, previous_fault, record_address, snapshot, FAULT_RECORD};

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use exit::exit_hook;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use save::save;
