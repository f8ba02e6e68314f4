//! Fault capture demo.
//!
//! Reports the record left by the previous run, then takes an undefined
//! instruction fault. The default `FaultExit` resets the chip, so the demo
//! cycles through a few faults before clearing the record and idling.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use defmt_rtt as _;
use panic_probe as _;

/// Faults to collect before the demo stops.
const FAULTS_BEFORE_IDLE: u32 = 3;

#[entry]
fn main() -> ! {
    defmt::info!("fault record at {=u32:#010x}", fault_handler::record_address());

    let count = match fault_handler::report_previous_fault() {
        Ok(record) => record.count,
        Err(_) => 0,
    };

    if count >= FAULTS_BEFORE_IDLE {
        defmt::info!("{} faults recorded, clearing", count);
        fault_handler::clear();
        loop {
            cortex_m::asm::wfi();
        }
    }

    defmt::info!("faulting ({} of {})", count.saturating_add(1), FAULTS_BEFORE_IDLE);
    cortex_m::asm::udf()
}
