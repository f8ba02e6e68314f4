//! Building `fault_demo` and checking where the linker put the record.

use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;
use fault_record::{Arch, FaultRecord, Profile};

use crate::elf;

pub const TARGET: &str = "thumbv7em-none-eabihf";
pub const CHIP: &str = "STM32H743ZITx";

/// The demo runs on a Cortex-M7.
const PROFILE: Profile = Profile::new(Arch::V7M, false, false);

const MEMORY_X: &str = include_str!("../../memory.x");

pub fn elf_path(release: bool) -> PathBuf {
    let mode = if release { "release" } else { "debug" };
    PathBuf::from("target").join(TARGET).join(mode).join("fault_demo")
}

/// `cargo build` the demo with its hardware stack.
pub fn build(release: bool) -> Result<PathBuf> {
    let start = Instant::now();
    let mut cmd = Command::new("cargo");
    cmd.args(["build", "-p", "fault-handler", "--bin", "fault_demo", "--features", "hardware", "--target", TARGET]);
    if release {
        cmd.arg("--release");
    }

    let output = cmd.output().context("Failed to run cargo build")?;
    if !output.status.success() {
        eprintln!("{}", "  ✗ fault_demo build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("fault_demo build failed");
    }

    println!(
        "{}",
        format!("  ✓ fault_demo built in {:.2}s", start.elapsed().as_secs_f64()).green()
    );
    Ok(elf_path(release))
}

/// Symbol bindings of the linked demo and the placement of `FAULT_RECORD`.
///
/// Skipped with a warning when no nm tool is installed.
pub fn verify(elf_path: &std::path::Path) -> Result<()> {
    let Some(symbols) = elf::symbols(elf_path)? else {
        println!("{}", "  ⚠ No nm tool found: FAULT_RECORD placement not checked".yellow());
        return Ok(());
    };

    let mut problems = elf::check_capture_symbols(&symbols, PROFILE, true);
    match elf::fault_record(&symbols) {
        Some((address, size)) => {
            println!(
                "   {}",
                format!(
                    "FAULT_RECORD at {address:#010x}, {} bytes",
                    size.map_or_else(|| "?".to_string(), |s| s.to_string())
                )
                .dimmed()
            );
            if let Some(problem) = placement_problem(address, MEMORY_X) {
                problems.push(problem);
            }
        }
        None => problems.push("FAULT_RECORD missing from the image".to_string()),
    }

    if !problems.is_empty() {
        eprintln!("{}", "  ✗ fault_demo image check failed".red().bold());
        for problem in &problems {
            eprintln!("     {problem}");
        }
        anyhow::bail!("fault_demo image check failed");
    }
    println!("{}", "  ✓ Vectors, FaultSave, weak FaultExit and FAULT_RECORD placement ok".green());
    Ok(())
}

/// `RAM` origin and length from a cortex-m-rt `memory.x`.
pub fn ram_region(memory_x: &str) -> Option<(u64, u64)> {
    let line = memory_x
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("RAM") && l.contains("ORIGIN"))?;
    let origin = line.split("ORIGIN").nth(1)?.split('=').nth(1)?.split(',').next()?.trim();
    let length = line.split("LENGTH").nth(1)?.split('=').nth(1)?.trim();

    let origin = u64::from_str_radix(origin.trim_start_matches("0x"), 16).ok()?;
    let length = match length.chars().last()? {
        'K' => length.trim_end_matches('K').parse::<u64>().ok()?.checked_mul(1024)?,
        'M' => length.trim_end_matches('M').parse::<u64>().ok()?.checked_mul(1024 * 1024)?,
        _ => length.parse().ok()?,
    };
    Some((origin, length))
}

fn placement_problem(address: u64, memory_x: &str) -> Option<String> {
    let Some((origin, length)) = ram_region(memory_x) else {
        return Some("memory.x has no RAM region".to_string());
    };
    let end = address + FaultRecord::SIZE as u64;
    if address < origin || end > origin + length {
        return Some(format!(
            "FAULT_RECORD at {address:#010x} is outside RAM {origin:#010x}..{:#010x}",
            origin + length
        ));
    }
    if address % 4 != 0 {
        return Some(format!("FAULT_RECORD at {address:#010x} is not word aligned"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_region_is_read_from_workspace_memory_x() {
        assert_eq!(ram_region(MEMORY_X), Some((0x2000_0000, 128 * 1024)));
    }

    #[test]
    fn record_inside_ram_is_accepted() {
        assert_eq!(placement_problem(0x2000_0000, MEMORY_X), None);
        assert_eq!(placement_problem(0x2002_0000 - 144, MEMORY_X), None);
    }

    #[test]
    fn record_outside_ram_is_rejected() {
        assert!(placement_problem(0x2400_0000, MEMORY_X).is_some());
        assert!(placement_problem(0x2002_0000 - 100, MEMORY_X).is_some());
        assert!(placement_problem(0x2000_0002, MEMORY_X).is_some());
    }

    #[test]
    fn elf_path_follows_mode() {
        assert!(elf_path(true).ends_with("thumbv7em-none-eabihf/release/fault_demo"));
        assert!(elf_path(false).ends_with("thumbv7em-none-eabihf/debug/fault_demo"));
    }
}
