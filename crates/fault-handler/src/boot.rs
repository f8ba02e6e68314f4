//! Boot-time look at the record a previous fault left behind.

use fault_record::{FaultRecord, RecordError};

use crate::storage::previous_fault;

/// Exception number field of IPSR/xPSR.
const EXCEPTION_NUMBER_MASK: u32 = 0x1FF;

/// The handful of fields worth one log line at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultSummary {
    /// Faults captured since the record was last cleared.
    pub count: u32,
    /// Exception that ran the capture (3 = HardFault, 4 = MemManage, ...).
    pub exception: u32,
    /// Faulting instruction, when the stacked frame was readable.
    pub return_address: Option<u32>,
    /// CFSR, on targets with configurable fault status registers.
    pub cfsr: Option<u32>,
    /// HFSR, on targets with configurable fault status registers.
    pub hfsr: Option<u32>,
    /// Fault taken in Non-secure state, seen from a Secure build.
    pub non_secure: bool,
}

impl FaultSummary {
    /// Summarise a validated record.
    pub fn of(record: &FaultRecord) -> Self {
        let status = record.fault_status();
        Self {
            count: record.count,
            exception: record.exc_xpsr & EXCEPTION_NUMBER_MASK,
            return_address: record.stacked_frame().map(|frame| frame.return_address),
            cfsr: status.map(|s| s.cfsr),
            hfsr: status.map(|s| s.hfsr),
            non_secure: record.non_secure_fault(),
        }
    }
}

/// Validate the persisted record and log what it says.
///
/// Call once early in `main`. A valid record is logged at `warn`; anything
/// else (first boot, cleared, corrupted) is logged at `debug` with the reason.
/// The record is left as is: clearing it is the application's decision.
pub fn report_previous_fault() -> Result<FaultRecord, RecordError> {
    let result = previous_fault();

    #[cfg(feature = "defmt")]
    match &result {
        Ok(record) => {
            let summary = FaultSummary::of(record);
            defmt::warn!(
                "previous fault #{}: exception {}, pc {}, cfsr {}, hfsr {}, non-secure {}",
                summary.count,
                summary.exception,
                summary.return_address,
                summary.cfsr,
                summary.hfsr,
                summary.non_secure
            );
        }
        Err(e) => defmt::debug!("no previous fault: {}", e),
    }

    result
}
