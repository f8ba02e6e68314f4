//! xtask decode: print a fault record dumped over the debug link.
//!
//! Dump the 144 bytes at `FAULT_RECORD` with any debugger, e.g.
//! `probe-rs read --chip STM32H743ZITx b32 <addr> 36 > fault.txt` (hex words)
//! or GDB `dump binary memory fault.bin &FAULT_RECORD (&FAULT_RECORD)+1`.
//! Both raw binary and whitespace-separated hex words are accepted.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use fault_record::{FaultRecord, InfoFlags};

/// Entry point called from main.rs
pub fn run(dump: &Path) -> Result<()> {
    let raw = std::fs::read(dump).with_context(|| format!("Failed to read {}", dump.display()))?;
    let bytes = parse_dump(&raw)?;
    let record = FaultRecord::from_bytes(&bytes)?;

    println!();
    match record.check() {
        Ok(()) => println!("{}", "✓ Valid fault record".green().bold()),
        Err(e) => println!("{}", format!("⚠ {e}: fields below are not trustworthy").yellow().bold()),
    }
    println!();
    print!("{}", render(&record));
    println!();
    Ok(())
}

/// Hex text (`0x`-prefixed or bare, bytes or 32-bit words) or raw bytes.
///
/// Text is tried first so a word dump that happens to be 144 bytes long is
/// not mistaken for a binary image.
pub(crate) fn parse_dump(raw: &[u8]) -> Result<Vec<u8>> {
    if let Some(tokens) = hex_tokens(raw) {
        return parse_hex(&tokens);
    }
    if raw.len() == FaultRecord::SIZE {
        return Ok(raw.to_vec());
    }
    anyhow::bail!("dump is neither 144 raw bytes nor hex text")
}

/// Digits of every token, or `None` unless the whole input is hex text.
fn hex_tokens(raw: &[u8]) -> Option<Vec<&str>> {
    let text = std::str::from_utf8(raw).ok()?;
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")).unwrap_or(t))
        .collect();
    let is_hex = |t: &&str| (1..=8).contains(&t.len()) && t.chars().all(|c| c.is_ascii_hexdigit());
    (!tokens.is_empty() && tokens.iter().all(is_hex)).then_some(tokens)
}

/// 144 tokens of at most two digits are bytes, anything else is words.
fn parse_hex(tokens: &[&str]) -> Result<Vec<u8>> {
    if tokens.len() == FaultRecord::SIZE && tokens.iter().all(|t| t.len() <= 2) {
        return tokens
            .iter()
            .map(|t| u8::from_str_radix(t, 16).with_context(|| format!("bad byte `{t}`")))
            .collect();
    }
    let mut bytes = Vec::with_capacity(tokens.len().saturating_mul(4));
    for token in tokens {
        let word = u32::from_str_radix(token, 16).with_context(|| format!("bad word `{token}`"))?;
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    Ok(bytes)
}

/// Human-readable listing of every field the info word marks as present.
pub(crate) fn render(record: &FaultRecord) -> String {
    let mut out = String::new();
    let info = record.info();
    let _ = writeln!(out, "count        {}", record.count);
    let _ = writeln!(out, "info         {info:?}");
    let _ = writeln!(out, "exception    {}", record.exc_xpsr & 0x1FF);
    if info.contains(InfoFlags::NONSECURE_FAULT) {
        let _ = writeln!(out, "state        Non-secure");
    }

    if let Some(frame) = record.stacked_frame() {
        let _ = writeln!(out, "pc           {:#010x}", frame.return_address);
        let _ = writeln!(out, "lr           {:#010x}", frame.lr);
        let _ = writeln!(out, "xpsr         {:#010x}", frame.xpsr);
        let _ = writeln!(
            out,
            "r0-r3        {:#010x} {:#010x} {:#010x} {:#010x}",
            frame.r0, frame.r1, frame.r2, frame.r3
        );
        let _ = writeln!(out, "r12          {:#010x}", frame.r12);
    } else {
        let _ = writeln!(out, "stacked frame not captured (bad stack pointer)");
    }
    let regs = record.callee_saved();
    let _ = writeln!(
        out,
        "r4-r11       {}",
        regs.iter().map(|r| format!("{r:#010x}")).collect::<Vec<_>>().join(" ")
    );
    let _ = writeln!(out, "exc_return   {:#010x}", record.exc_return);
    let _ = writeln!(out, "msp / psp    {:#010x} / {:#010x}", record.msp, record.psp);

    if let Some(limits) = record.stack_limits() {
        let _ = writeln!(out, "msplim/psplim {:#010x} / {:#010x}", limits.msplim, limits.psplim);
    }
    if let Some(status) = record.fault_status() {
        let _ = writeln!(out, "cfsr         {:#010x}", status.cfsr);
        let cause = match (status.forced(), status.vector_table_read()) {
            (true, _) => " (forced)",
            (false, true) => " (vector table read)",
            (false, false) => "",
        };
        let _ = writeln!(out, "hfsr         {:#010x}{cause}", status.hfsr);
        let _ = writeln!(out, "dfsr         {:#010x}", status.dfsr);
        if status.mmfar_valid() {
            let _ = writeln!(out, "mmfar        {:#010x}", status.mmfar);
        }
        if status.bfar_valid() {
            let _ = writeln!(out, "bfar         {:#010x}", status.bfar);
        }
        let _ = writeln!(out, "afsr         {:#010x}", status.afsr);
        if status.stacking_error() {
            let _ = writeln!(out, "stacking error: frame above is unavailable");
        }
    }
    if let Some(secure) = record.secure_fault_status() {
        let _ = writeln!(out, "sfsr / sfar  {:#010x} / {:#010x}", secure.sfsr, secure.sfar);
    }
    if let Some(rfsr) = record.ras_fault_status() {
        let _ = writeln!(out, "rfsr         {rfsr:#010x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_record::{capture, Profile, SimulatedCpu, StackPointer};
    use zerocopy::IntoBytes;

    fn sample() -> FaultRecord {
        let mut cpu = SimulatedCpu::new(0xFFFF_FFFD)
            .with_stack_pointer(StackPointer::Process, 0x2000_0800)
            .with_frame(0x2000_0800, [1, 2, 3, 4, 12, 0x0800_0041, 0x0800_0200, 0x0100_0000]);
        let mut record = FaultRecord::ZEROED;
        capture(&mut record, &mut cpu, Profile::CURRENT);
        record
    }

    #[test]
    fn raw_dump_is_taken_as_is() {
        let record = sample();
        let bytes = parse_dump(record.as_bytes()).unwrap();
        assert_eq!(FaultRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn hex_word_dump_is_little_endian() {
        let record = sample();
        let words: Vec<String> = record
            .as_bytes()
            .chunks(4)
            .map(|c| format!("0x{:08x}", u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect();
        let bytes = parse_dump(words.join(" ").as_bytes()).unwrap();
        assert_eq!(FaultRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn unpadded_word_dump_is_accepted() {
        let record = sample();
        let words: Vec<String> = record
            .as_bytes()
            .chunks(4)
            .map(|c| format!("{:x}", u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect();
        let bytes = parse_dump(words.join(",").as_bytes()).unwrap();
        assert_eq!(FaultRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn hex_text_of_record_length_is_not_taken_as_raw() {
        let text = "0x0 ".repeat(36);
        assert_eq!(text.len(), FaultRecord::SIZE);
        let bytes = parse_dump(text.as_bytes()).unwrap();
        assert_eq!(bytes, vec![0; FaultRecord::SIZE]);
        assert_eq!(FaultRecord::from_bytes(&bytes).unwrap(), FaultRecord::ZEROED);
    }

    #[test]
    fn byte_dump_of_record_length_is_bytes() {
        let record = sample();
        let text: Vec<String> = record.as_bytes().iter().map(|b| format!("{b:02x}")).collect();
        let bytes = parse_dump(text.join(" ").as_bytes()).unwrap();
        assert_eq!(bytes, record.as_bytes());
    }

    #[test]
    fn truncated_dump_is_rejected() {
        let bytes = parse_dump(b"aa bb cc").unwrap();
        assert!(FaultRecord::from_bytes(&bytes).is_err());
        assert!(parse_dump(b"xyz").is_err());
        assert!(parse_dump(b"0x123456789").is_err());
    }

    #[test]
    fn render_lists_frame_fields() {
        let text = render(&sample());
        assert!(text.contains("count        1"));
        assert!(text.contains("pc           0x08000200"));
        assert!(text.contains("lr           0x08000041"));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fault.bin");
        std::fs::write(&path, sample().as_bytes()).unwrap();
        run(&path).unwrap();
    }
}
