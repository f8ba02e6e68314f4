//! Symbol tables of cross-built objects and ELFs.
//!
//! Shells out to whichever `nm` is installed (`arm-none-eabi-nm`, `llvm-nm`,
//! or `rust-nm` from cargo-binutils) and checks the fault capture symbols.

use std::path::Path;
use std::process::Command;

use anyhow::Result;
use fault_record::{FaultRecord, Profile};

const NM_TOOLS: &[&str] = &["arm-none-eabi-nm", "llvm-nm", "rust-nm"];

/// One `nm --print-size --radix=x` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    /// nm type letter: `T` global text, `W` weak, `B`/`D` data.
    pub kind: char,
    pub address: u64,
    pub size: Option<u64>,
}

/// Symbols of `path`, or `None` when no nm tool is installed.
pub fn symbols(path: &Path) -> Result<Option<Vec<Symbol>>> {
    for tool in NM_TOOLS {
        let Ok(output) = Command::new(tool)
            .args(["--print-size", "--radix=x", "--defined-only"])
            .arg(path)
            .output()
        else {
            continue;
        };
        if !output.status.success() {
            anyhow::bail!("{tool} failed on {}: {}", path.display(), String::from_utf8_lossy(&output.stderr));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        return Ok(Some(text.lines().filter_map(parse_nm_line).collect()));
    }
    Ok(None)
}

/// `address [size] kind name`
pub fn parse_nm_line(line: &str) -> Option<Symbol> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let (address, size, kind, name) = match fields.as_slice() {
        [address, size, kind, name] => (*address, Some(*size), *kind, *name),
        [address, kind, name] => (*address, None, *kind, *name),
        _ => return None,
    };
    let mut kind_chars = kind.chars();
    let kind = kind_chars.next()?;
    if kind_chars.next().is_some() {
        return None;
    }
    Some(Symbol {
        name: name.to_string(),
        kind,
        address: u64::from_str_radix(address, 16).ok()?,
        size: size.and_then(|s| u64::from_str_radix(s, 16).ok()),
    })
}

fn find<'a>(symbols: &'a [Symbol], name: &str) -> Option<&'a Symbol> {
    symbols.iter().find(|s| s.name == name)
}

/// Binding and presence of the capture symbols in one profile's object.
///
/// Returns every violation found, empty when the object is sound.
pub fn check_capture_symbols(symbols: &[Symbol], profile: Profile, vectors: bool) -> Vec<String> {
    let mut problems = Vec::new();

    match find(symbols, "FaultSave") {
        Some(s) if s.kind == 'T' => {}
        Some(s) => problems.push(format!("FaultSave has type `{}`, expected global text `T`", s.kind)),
        None => problems.push("FaultSave not defined".to_string()),
    }
    match find(symbols, "FaultExit") {
        Some(s) if s.kind == 'W' => {}
        Some(s) => problems.push(format!("FaultExit has type `{}`, expected weak `W`", s.kind)),
        None => problems.push("FaultExit not defined".to_string()),
    }
    match find(symbols, "FAULT_RECORD") {
        Some(Symbol { size: Some(size), .. }) if *size != FaultRecord::SIZE as u64 => {
            problems.push(format!("FAULT_RECORD is {size} bytes, expected {}", FaultRecord::SIZE));
        }
        Some(_) => {}
        None => problems.push("FAULT_RECORD not defined".to_string()),
    }

    let expected_vectors = [
        ("HardFault", vectors),
        ("MemoryManagement", vectors && profile.has_fault_registers()),
        ("BusFault", vectors && profile.has_fault_registers()),
        ("UsageFault", vectors && profile.has_fault_registers()),
        ("SecureFault", vectors && profile.reads_secure_fault_registers()),
    ];
    for (name, expected) in expected_vectors {
        match (find(symbols, name), expected) {
            (Some(s), true) if s.kind != 'T' => {
                problems.push(format!("{name} has type `{}`, expected global text `T`", s.kind));
            }
            (None, true) => problems.push(format!("{name} not defined")),
            (Some(_), false) => problems.push(format!("{name} defined on a target without it")),
            _ => {}
        }
    }
    problems
}

/// Address and size of `FAULT_RECORD` in a linked image.
pub fn fault_record(symbols: &[Symbol]) -> Option<(u64, Option<u64>)> {
    find(symbols, "FAULT_RECORD").map(|s| (s.address, s.size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_record::Arch;

    fn sym(name: &str, kind: char) -> Symbol {
        Symbol { name: name.to_string(), kind, address: 0, size: None }
    }

    fn v7m_object() -> Vec<Symbol> {
        vec![
            sym("FaultSave", 'T'),
            sym("FaultExit", 'W'),
            Symbol { name: "FAULT_RECORD".to_string(), kind: 'B', address: 0x2000_0000, size: Some(144) },
            sym("HardFault", 'T'),
            sym("MemoryManagement", 'T'),
            sym("BusFault", 'T'),
            sym("UsageFault", 'T'),
        ]
    }

    #[test]
    fn parses_sized_and_unsized_lines() {
        assert_eq!(
            parse_nm_line("20000000 00000090 B FAULT_RECORD"),
            Some(Symbol { name: "FAULT_RECORD".to_string(), kind: 'B', address: 0x2000_0000, size: Some(0x90) })
        );
        assert_eq!(parse_nm_line("00000000 W FaultExit").map(|s| (s.kind, s.size)), Some(('W', None)));
        assert_eq!(parse_nm_line("fault_handler-1234.o:"), None);
        assert_eq!(parse_nm_line(""), None);
    }

    #[test]
    fn sound_v7m_object_passes() {
        let profile = Profile::new(Arch::V7M, false, false);
        assert!(check_capture_symbols(&v7m_object(), profile, true).is_empty());
    }

    #[test]
    fn strong_exit_hook_is_reported() {
        let mut symbols = v7m_object();
        symbols[1].kind = 'T';
        let problems = check_capture_symbols(&symbols, Profile::new(Arch::V7M, false, false), true);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("FaultExit"));
    }

    #[test]
    fn vectors_follow_profile() {
        let v6m = Profile::new(Arch::V6M, false, false);
        let problems = check_capture_symbols(&v7m_object(), v6m, true);
        assert_eq!(problems.len(), 3, "{problems:?}");

        let secure = Profile::new(Arch::V8MMainline, true, true);
        let problems = check_capture_symbols(&v7m_object(), secure, true);
        assert_eq!(problems, vec!["SecureFault not defined".to_string()]);
    }

    #[test]
    fn wrong_record_size_is_reported() {
        let mut symbols = v7m_object();
        symbols[2].size = Some(128);
        let problems = check_capture_symbols(&symbols, Profile::new(Arch::V7M, false, false), true);
        assert_eq!(problems, vec!["FAULT_RECORD is 128 bytes, expected 144".to_string()]);
    }
}
