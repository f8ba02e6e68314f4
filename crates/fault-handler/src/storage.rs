//! The persisted record and the normal-execution API around it.
//!
//! `FAULT_RECORD` lives in `.uninit.FAULT_RECORD`, which cortex-m-rt places in
//! a NOLOAD region: startup neither zeroes nor initialises it, and the reset
//! requested by the exit hook leaves SRAM intact. Host builds keep the same
//! static, zero-initialised, so the API can be tested.
//!
//! All access goes through volatile reads and writes: the capture routine
//! writes the record behind the compiler's back, and the contents carry over
//! from before the last reset.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

use fault_record::capture::{capture, CaptureReport, CpuAccess};
use fault_record::{FaultRecord, Profile, RecordError};

/// Storage cell for [`FAULT_RECORD`].
#[repr(transparent)]
pub struct RecordCell(UnsafeCell<MaybeUninit<FaultRecord>>);

// SAFETY: one execution context per core. The capture routine is the only
// writer outside normal execution and it never returns to interrupted code.
unsafe impl Sync for RecordCell {}

impl RecordCell {
    const fn new() -> Self {
        if cfg!(all(target_arch = "arm", target_os = "none")) {
            Self(UnsafeCell::new(MaybeUninit::uninit()))
        } else {
            Self(UnsafeCell::new(MaybeUninit::new(FaultRecord::ZEROED)))
        }
    }

    /// Raw pointer to the record, for the capture routine and debug tooling.
    pub const fn as_ptr(&self) -> *mut FaultRecord {
        self.0.get().cast::<FaultRecord>()
    }
}

/// The persisted fault record.
///
/// Exported unmangled so a debug-link tool can locate it in the ELF.
#[no_mangle]
#[used]
#[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".uninit.FAULT_RECORD")]
pub static FAULT_RECORD: RecordCell = RecordCell::new();

/// Address of [`FAULT_RECORD`].
#[allow(clippy::cast_possible_truncation)] // 32-bit address space on target
pub fn record_address() -> u32 {
    FAULT_RECORD.as_ptr() as usize as u32
}

/// Volatile copy of the record as it currently is in memory.
///
/// The copy may hold anything, including power-on garbage: check it with
/// [`FaultRecord::check`] or use [`previous_fault`].
pub fn snapshot() -> FaultRecord {
    // SAFETY: the pointer is valid and aligned for the static's lifetime, and
    // every bit pattern is a valid `FaultRecord` (all fields are `u32`).
    unsafe { ptr::read_volatile(FAULT_RECORD.as_ptr()) }
}

/// Overwrite the record. The magic number is written last, so a reader never
/// sees a valid magic in front of a half-written payload.
fn store(record: &FaultRecord) {
    let dst = FAULT_RECORD.as_ptr();
    let mut body = *record;
    body.magic_number = 0;
    // SAFETY: see `snapshot`; the static is only written from this context.
    unsafe {
        ptr::write_volatile(dst, body);
        compiler_fence(Ordering::SeqCst);
        ptr::write_volatile(ptr::addr_of_mut!((*dst).magic_number), record.magic_number);
    }
}

/// Zero the entire record. Idempotent.
pub fn clear() {
    // SAFETY: see `snapshot`.
    unsafe { ptr::write_volatile(FAULT_RECORD.as_ptr(), FaultRecord::ZEROED) };
    compiler_fence(Ordering::SeqCst);

    #[cfg(feature = "defmt")]
    defmt::debug!("fault record cleared");
}

/// `true` if the record holds a genuine, uncorrupted capture.
pub fn occurred() -> bool {
    snapshot().occurred()
}

/// Validated copy of the record left by a previous capture.
pub fn previous_fault() -> Result<FaultRecord, RecordError> {
    let record = snapshot();
    record.check()?;
    Ok(record)
}

/// Run the capture steps against `cpu` and persist the result.
///
/// This is the software rendition of `FaultSave`: the same record, the same
/// flags, for the profile this crate was built for. Used for emulation and to
/// exercise the persisted path on the host.
pub fn capture_with<C: CpuAccess + ?Sized>(cpu: &mut C) -> CaptureReport {
    let mut record = snapshot();
    let report = capture(&mut record, cpu, Profile::CURRENT);
    store(&record);
    report
}
