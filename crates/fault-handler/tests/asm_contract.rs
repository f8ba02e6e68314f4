//! Source-level checks on the assembly routines.
//!
//! The routines only assemble for Cortex-M targets, so host runs check the
//! properties a reviewer would otherwise have to eyeball: symbol binding,
//! ordering of the seal, and that every layout constant comes from
//! `fault-record` instead of being typed into the template.
// Architecture test file: expect/unwrap/indexing are intentional.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

const SAVE: &str = include_str!("../src/save.rs");
const EXIT: &str = include_str!("../src/exit.rs");
const VECTORS: &str = include_str!("../src/vectors.rs");
const STORAGE: &str = include_str!("../src/storage.rs");

/// The part of a source file between `global_asm!(` and the closing `"#`.
fn template(source: &str) -> &str {
    let start = source.find("global_asm!(").expect("no global_asm! block");
    let body = &source[start..];
    let end = body.find("\"#,").expect("unterminated template");
    &body[..end]
}

/// The operand list following the template.
fn operands(source: &str) -> &str {
    let start = source.find("\"#,").expect("no operands");
    let body = &source[start..];
    let end = body.find(");").expect("unterminated operands");
    &body[..end]
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack.find(needle).unwrap_or_else(|| panic!("`{needle}` not found"))
}

#[test]
fn fault_save_is_global_in_its_own_section() {
    let asm = template(SAVE);
    assert!(asm.contains(".globl FaultSave"));
    assert!(asm.contains(".thumb_func\nFaultSave:"));
    assert!(asm.contains(r#".section .text.FaultSave,"ax",%progbits"#));
    assert!(asm.contains(".size FaultSave, . - FaultSave"));
}

#[test]
fn fault_exit_is_weak() {
    let asm = template(EXIT);
    assert!(asm.contains(".weak FaultExit"));
    assert!(!asm.contains(".globl FaultExit"), "a global default would clash with an override");
}

#[test]
fn fault_save_ends_in_fault_exit() {
    let asm = template(SAVE);
    let exit = position(asm, "ldr   r0, =FaultExit");
    let bx = position(asm, "bx    r0");
    assert!(bx > exit);
    // No return path back into the interrupted code.
    assert!(!asm.contains("bx    lr"));
    assert!(!asm.contains("pop"));
}

#[test]
fn magic_is_written_after_crc_then_barrier() {
    let asm = template(SAVE);
    let crc = position(asm, "={rec}+{o_crc}");
    let magic = position(asm, "={rec}+{o_magic}");
    let dsb = position(asm, "dsb");
    assert!(crc < magic, "CRC must be stored before the magic number");
    assert!(magic < dsb, "barrier must follow the magic number");
}

#[test]
fn count_is_read_before_the_wipe() {
    let asm = template(SAVE);
    let load = position(asm, "ldr   r3, [r2]");
    let wipe = position(asm, "stm   r1!, {{r0}}");
    assert!(load < wipe);
}

#[test]
fn record_offsets_come_from_operands() {
    let asm = template(SAVE);
    for line in asm.lines().filter(|l| l.contains("{rec}+")) {
        assert!(line.contains("{rec}+{o_"), "literal record offset in `{}`", line.trim());
    }
    let ops = operands(SAVE);
    assert!(ops.contains("rec = sym FAULT_RECORD"));
    assert!(ops.contains("offset::"));
    assert!(ops.contains("magic = const FaultRecord::MAGIC"));
}

#[test]
fn no_layout_literals_in_templates() {
    for (name, source) in [("save", SAVE), ("exit", EXIT), ("vectors", VECTORS)] {
        let asm = template(source);
        for literal in ["FltR", "0x52746C46", "0x5274_6C46", "0xE000ED", "0xE002ED", "0x04C11DB7", "0xFEFA125A"] {
            assert!(!asm.contains(literal), "{name}: `{literal}` belongs in an operand");
        }
    }
}

#[test]
fn optional_blocks_are_driven_by_profile() {
    let ops = operands(SAVE);
    for switch in ["secure", "armv8", "ns_limits", "fault_regs", "ras", "secure_regs"] {
        assert!(template(SAVE).contains(&format!(".if {{{switch}}}")), "missing .if {{{switch}}}");
        assert!(ops.contains(&format!("{switch} = const flag(Profile::CURRENT.")));
    }
}

#[test]
fn secure_only_instructions_stay_behind_the_secure_switch() {
    let asm = template(SAVE);
    let mut depth_secure = Vec::new();
    for line in asm.lines().map(str::trim) {
        if let Some(cond) = line.strip_prefix(".if ") {
            depth_secure.push(cond == "{secure}");
        } else if line == ".endif" {
            depth_secure.pop();
        } else if line.contains("_ns") {
            assert!(depth_secure.contains(&true), "`{line}` outside .if {{secure}}");
        }
    }
}

#[test]
fn macros_are_purged() {
    assert!(template(SAVE).contains(".purgem fault_info_or"));
    assert!(template(VECTORS).contains(".purgem fault_vector"));
}

#[test]
fn vectors_branch_to_fault_save() {
    let asm = template(VECTORS);
    assert!(asm.contains("ldr   r0, =FaultSave\n    bx    r0"));
    assert!(asm.contains("fault_vector HardFault"));
    for configurable in ["MemoryManagement", "BusFault", "UsageFault"] {
        assert!(asm.contains(&format!("fault_vector {configurable}")));
    }
    let secure = position(asm, ".if {secure_fault}");
    assert!(position(asm, "fault_vector SecureFault") > secure);
}

#[test]
fn vectors_are_gated_on_feature() {
    let gate = position(VECTORS, r#"#[cfg(all(feature = "vectors", target_arch = "arm", target_os = "none"))]"#);
    assert!(gate < position(VECTORS, "global_asm!("));
}

#[test]
fn record_lives_in_uninit_section() {
    let decl = position(STORAGE, "pub static FAULT_RECORD");
    let section = position(STORAGE, r#"link_section = ".uninit.FAULT_RECORD""#);
    let no_mangle = position(STORAGE, "#[no_mangle]");
    assert!(section < decl && decl - section < 200);
    assert!(no_mangle < decl && decl - no_mangle < 200);
}
