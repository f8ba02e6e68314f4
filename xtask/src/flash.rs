use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use crate::demo;

pub fn run(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!("{}", format!("🔨 Building fault_demo ({mode} mode)...").cyan().bold());
    println!();

    let elf = demo::build(release)?;
    demo::verify(&elf)?;
    show_sections(&elf);
    println!();

    println!("{}", format!("📡 Flashing to {}...", demo::CHIP).cyan().bold());
    println!("   {}", "Connecting to the debugger...".dimmed());

    let flash_start = Instant::now();
    let status = Command::new("probe-rs")
        .arg("run")
        .arg(&elf)
        .args(["--chip", demo::CHIP, "--probe-index", "0"])
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !status.success() {
        anyhow::bail!("Flash failed - check that the debugger is connected and the device is powered");
    }

    println!(
        "{}",
        format!("✓ probe-rs session ended after {:.2}s", flash_start.elapsed().as_secs_f64()).green()
    );
    println!(
        "   {}",
        "Dump the record with `probe-rs read b32 <FAULT_RECORD> 36`, then `cargo xtask decode <file>`".dimmed()
    );
    println!();

    Ok(())
}

/// `.uninit` (where FAULT_RECORD lives) and the other allocated sections.
fn show_sections(elf: &Path) {
    for tool in ["arm-none-eabi-size", "rust-size", "llvm-size"] {
        let Ok(out) = Command::new(tool).arg("-A").arg(elf).output() else {
            continue;
        };
        if !out.status.success() {
            continue;
        }
        println!("{}", "📊 Sections:".cyan());
        let text = String::from_utf8_lossy(&out.stdout);
        for line in text.lines().filter(|l| l.starts_with('.')) {
            if line.starts_with(".uninit") {
                println!("   {}", line.bold());
            } else {
                println!("   {}", line.dimmed());
            }
        }
        return;
    }
    println!("   {}", "no size tool found, sections not shown".dimmed());
}
