//! Register access through the `devmem2` utility.
//!
//! `devmem2` is a tiny `/dev/mem` poker that is always shipped in the setup initramfs. Its output
//! is meant for humans, so both forms of invocation are scraped:
//!
//! ```text
//! $ devmem2 0x01C00024 w
//! /dev/mem opened.
//! Memory mapped at address 0xb6f6f000.
//! Value at address 0x1C00024 (0xb6f6f024): 0x16238000
//!
//! $ devmem2 0x01C00024 w 0x16238000
//! ...
//! Written 0x16238000; readback 0x16238000
//! ```

use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

fn read_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Value at address 0x([0-9A-Fa-f]+) \(0x[0-9A-Fa-f]+\): 0x([0-9A-Fa-f]+)")
            .unwrap()
    })
}

fn write_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Written 0x([0-9A-Fa-f]+)").unwrap())
}

/// Extract the value from the output of a read of `addr`.
///
/// The output must report the same address that was asked for; anything else is a failure.
pub fn parse_read(output: &str, addr: u32) -> Option<u32> {
    let caps = read_pattern().captures(output)?;
    let reported_addr = u32::from_str_radix(&caps[1], 16).ok()?;
    if reported_addr != addr {
        return None;
    }
    u32::from_str_radix(&caps[2], 16).ok()
}

/// Check the output of a write of `value`; returns `Some(())` if the tool confirms that exact
/// value was written.
pub fn parse_write(output: &str, value: u32) -> Option<()> {
    let caps = write_pattern().captures(output)?;
    let written = u32::from_str_radix(&caps[1], 16).ok()?;
    (written == value).then_some(())
}

/// Handle on the external register I/O utility
#[derive(Debug, Clone)]
pub struct DevMem {
    program: String,
}

impl DevMem {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[String]) -> Option<String> {
        let output = match Command::new(&self.program).args(args).output() {
            Ok(output) => output,
            Err(error) => {
                debug!(program = %self.program, %error, "register tool failed to start");
                return None;
            }
        };
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Read a 32-bit word; `None` on any failure
    pub fn read_word(&self, addr: u32) -> Option<u32> {
        let output = self.run(&[format!("0x{addr:08X}"), "w".into()])?;
        let value = parse_read(&output, addr);
        debug!(addr = format_args!("0x{addr:08X}"), ?value, "register read");
        value
    }

    /// Write a 32-bit word; `None` on any failure
    pub fn write_word(&self, addr: u32, value: u32) -> Option<()> {
        let output = self.run(&[format!("0x{addr:08X}"), "w".into(), format!("0x{value:08X}")])?;
        let result = parse_write(&output, value);
        debug!(
            addr = format_args!("0x{addr:08X}"),
            value = format_args!("0x{value:08X}"),
            ok = result.is_some(),
            "register write"
        );
        result
    }
}

#[test]
fn test_parse_read() {
    let output = "/dev/mem opened.\n\
                  Memory mapped at address 0xb6f6f000.\n\
                  Value at address 0x1C00024 (0xb6f6f024): 0x16238000\n";
    assert_eq!(parse_read(output, 0x01C0_0024), Some(0x1623_8000));

    // Address mismatch
    assert_eq!(parse_read(output, 0x01C2_3808), None);

    assert_eq!(parse_read("Error at line 61, file devmem2.c (1)", 0x01C0_0024), None);
    assert_eq!(parse_read("", 0x01C0_0024), None);
}

#[test]
fn test_parse_read_lowercase() {
    let output = "Value at address 0x1c23808 (0xb6fa3808): 0x3a00";
    assert_eq!(parse_read(output, 0x01C2_3808), Some(0x3A00));
}

#[test]
fn test_parse_write() {
    let output = "Value at address 0x1C00024 (0xb6f6f024): 0x16230000\n\
                  Written 0x16238000; readback 0x16238000\n";
    assert_eq!(parse_write(output, 0x1623_8000), Some(()));
    assert_eq!(parse_write(output, 0x1623_0000), None);
    assert_eq!(parse_write("Illegal data type 'w'.", 0x1623_8000), None);
}
