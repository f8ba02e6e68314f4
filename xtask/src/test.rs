use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Which host test targets a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// `#[cfg(test)]` modules only.
    Unit,
    /// `tests/` directories only.
    Integration,
    All,
}

impl Scope {
    fn from_flags(unit_only: bool, integration_only: bool) -> Self {
        match (unit_only, integration_only) {
            (true, false) => Self::Unit,
            (false, true) => Self::Integration,
            _ => Self::All,
        }
    }

    fn cargo_args(self) -> &'static [&'static str] {
        match self {
            Self::Unit => &["--lib"],
            Self::Integration => &["--test", "*"],
            Self::All => &[],
        }
    }
}

/// One `cargo test` invocation. The host models Armv7-M by default and
/// Armv8-M Mainline when a TrustZone or 8.1-M feature is on.
struct Suite {
    label: &'static str,
    package: &'static str,
    features: &'static str,
}

const SUITES: &[Suite] = &[
    Suite { label: "fault-record, Armv7-M model", package: "fault-record", features: "std" },
    Suite { label: "fault-record, Armv8.1-M Secure model", package: "fault-record", features: "std,armv8_1m,secure" },
    Suite { label: "fault-handler, Armv7-M", package: "fault-handler", features: "" },
    Suite { label: "fault-handler, Armv8-M Secure", package: "fault-handler", features: "secure" },
    Suite { label: "fault-handler, halt exit", package: "fault-handler", features: "exit-halt" },
    Suite { label: "xtask", package: "xtask", features: "" },
];

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running host tests...".cyan().bold());
    println!();

    let total_start = Instant::now();
    let scope = Scope::from_flags(unit_only, integration_only);

    for suite in SUITES {
        // xtask has no tests/ directory.
        if scope == Scope::Integration && suite.package == "xtask" {
            continue;
        }
        run_suite(suite, scope)?;
    }
    println!();

    if scope == Scope::All {
        println!("{}", "  Running doc tests...".cyan());
        let doc_output = Command::new("cargo")
            .args(["test", "--doc", "-p", "fault-record", "-p", "fault-handler"])
            .output()
            .context("Failed to run doc tests")?;
        if doc_output.status.success() {
            let summary = extract_test_summary(&String::from_utf8_lossy(&doc_output.stdout));
            println!("{}", format!("  ✓ Doc tests {summary}").green());
        } else {
            eprintln!("{}", "  ⚠ Doc tests failed".yellow().bold());
        }
        println!();
    }

    println!(
        "{}",
        format!("✓ All tests completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}

fn run_suite(suite: &Suite, scope: Scope) -> Result<()> {
    let start = Instant::now();
    let mut cmd = Command::new("cargo");
    cmd.args(["test", "-p", suite.package]);
    if !suite.features.is_empty() {
        cmd.args(["--features", suite.features]);
    }
    // xtask is a binary crate whose tests are all unit tests.
    if suite.package != "xtask" {
        cmd.args(scope.cargo_args());
    }

    let output = cmd
        .output()
        .with_context(|| format!("Failed to run {}", suite.label))?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {} failed", suite.label).red().bold());
        eprintln!();
        for line in stdout.lines().filter(|l| !l.ends_with("... ok")) {
            eprintln!("  {line}");
        }
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("{} failed", suite.label);
    }

    println!(
        "{}",
        format!(
            "  ✓ {:<38} {} passed in {:.2}s",
            suite.label,
            passed_count(&stdout),
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    Ok(())
}

/// Sum of "N passed" over every test binary in the output.
fn passed_count(output: &str) -> u32 {
    output
        .lines()
        .filter_map(|l| l.split("test result:").nth(1))
        .filter_map(|r| r.split(';').next())
        .filter_map(|r| r.split_whitespace().rev().nth(1))
        .filter_map(|n| n.parse::<u32>().ok())
        .sum()
}

fn extract_test_summary(output: &str) -> String {
    output
        .lines()
        .find_map(|l| l.split("test result:").nth(1))
        .map_or_else(|| "(summary not available)".to_string(), |s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
running 3 tests
test result: ok. 3 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out
running 12 tests
test result: ok. 12 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out
";

    #[test]
    fn passed_counts_add_up_across_binaries() {
        assert_eq!(passed_count(OUTPUT), 15);
        assert_eq!(passed_count("error: could not compile"), 0);
    }

    #[test]
    fn summary_is_taken_from_first_result_line() {
        assert_eq!(
            extract_test_summary(OUTPUT),
            "ok. 3 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out"
        );
        assert_eq!(extract_test_summary("error: could not compile"), "(summary not available)");
    }

    #[test]
    fn scope_flags() {
        assert_eq!(Scope::from_flags(true, false), Scope::Unit);
        assert_eq!(Scope::from_flags(false, true), Scope::Integration);
        assert_eq!(Scope::from_flags(false, false), Scope::All);
        assert_eq!(Scope::from_flags(true, true), Scope::All);
    }

    #[test]
    fn secure_suites_exist_for_both_crates() {
        for package in ["fault-record", "fault-handler"] {
            assert!(SUITES.iter().any(|s| s.package == package && s.features.contains("secure")));
        }
    }
}
