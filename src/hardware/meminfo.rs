//! Parsing of the DRAM controller report printed by `a10-meminfo`.
//!
//! The tool dumps the DRAM controller settings as free-form `key = value` lines (the same shape as
//! the `[dram_para]` section of a `script.fex`). Only the handful of keys needed to derive the DRAM
//! size, bus width and clocks are picked out, each independently of the others.

use std::sync::OnceLock;

use regex::Regex;

/// DRAM parameters as reported by the controller. Every field is optional; a key missing from the
/// report simply stays `None`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct DramParams {
    /// DRAM clock in MHz
    pub dram_clk: Option<u32>,
    /// MBUS clock in MHz
    pub mbus_clk: Option<u32>,
    /// Density of a single DRAM chip, in Mbit
    pub chip_density: Option<u32>,
    /// Total data bus width, in bits
    pub bus_width: Option<u32>,
    /// Data width of a single DRAM chip, in bits
    pub io_width: Option<u32>,
}

fn key_pattern(key: &str) -> Regex {
    Regex::new(&format!(r"{key}\s*=\s*(\d+)")).unwrap()
}

fn patterns() -> &'static [Regex; 5] {
    static PATTERNS: OnceLock<[Regex; 5]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            key_pattern("dram_clk"),
            key_pattern("mbus_clk"),
            key_pattern("dram_chip_density"),
            key_pattern("dram_bus_width"),
            key_pattern("dram_io_width"),
        ]
    })
}

fn scan(pattern: &Regex, text: &str) -> Option<u32> {
    pattern.captures(text)?[1].parse().ok()
}

impl DramParams {
    pub fn parse(text: &str) -> Self {
        let [dram_clk, mbus_clk, chip_density, bus_width, io_width] = patterns();
        Self {
            dram_clk: scan(dram_clk, text),
            mbus_clk: scan(mbus_clk, text),
            chip_density: scan(chip_density, text),
            bus_width: scan(bus_width, text),
            io_width: scan(io_width, text),
        }
    }

    /// Total DRAM size in MiB: one chip holds `chip_density / 8` MiB, and `bus_width / io_width`
    /// chips are wired in parallel.
    ///
    /// Returns `None` if any input is missing, if `io_width` is zero, or if the result is zero.
    pub fn dram_size(&self) -> Option<u32> {
        let bus_width = u64::from(self.bus_width?);
        let chip_density = u64::from(self.chip_density?);
        let io_width = u64::from(self.io_width?);
        if io_width == 0 {
            return None;
        }

        let size = bus_width * chip_density / (io_width * 8);
        u32::try_from(size).ok().filter(|&size| size != 0)
    }

    /// The bus width, with zero meaning unknown
    pub fn known_bus_width(&self) -> Option<u32> {
        self.bus_width.filter(|&width| width != 0)
    }
}

#[cfg(test)]
const CUBIEBOARD_REPORT: &str = "\
dram_clk          = 480
mbus_clk          = 300
dram_type         = 3
dram_rank_num     = 1
dram_chip_density = 4096
dram_io_width     = 16
dram_bus_width    = 32
dram_cas          = 6
dram_zq           = 0x7f
dram_odt_en       = 0
dram_tpr0         = 0x42d899b7
";

#[test]
fn test_parse_report() {
    let params = DramParams::parse(CUBIEBOARD_REPORT);
    assert_eq!(
        params,
        DramParams {
            dram_clk: Some(480),
            mbus_clk: Some(300),
            chip_density: Some(4096),
            bus_width: Some(32),
            io_width: Some(16),
        }
    );
    assert_eq!(params.dram_size(), Some(1024));
    assert_eq!(params.known_bus_width(), Some(32));
}

#[test]
fn test_parse_partial_report() {
    let params = DramParams::parse("dram_clk=360\ndram_bus_width = 16\nmbus_clk = junk\n");
    assert_eq!(params.dram_clk, Some(360));
    assert_eq!(params.mbus_clk, None);
    assert_eq!(params.bus_width, Some(16));
    assert_eq!(params.dram_size(), None);

    assert_eq!(DramParams::parse(""), DramParams::default());
}

#[test]
fn test_dram_size() {
    let params = |bus_width, chip_density, io_width| DramParams {
        bus_width: Some(bus_width),
        chip_density: Some(chip_density),
        io_width: Some(io_width),
        ..Default::default()
    };

    assert_eq!(params(16, 2048, 16).dram_size(), Some(256));
    assert_eq!(params(32, 2048, 8).dram_size(), Some(1024));
    assert_eq!(params(16, 4096, 8).dram_size(), Some(1024));

    // Integer division
    assert_eq!(params(16, 1000, 16).dram_size(), Some(125));
    assert_eq!(params(16, 1001, 16).dram_size(), Some(125));

    // Unknown rather than zero or a division by zero
    assert_eq!(params(16, 2048, 0).dram_size(), None);
    assert_eq!(params(0, 2048, 16).dram_size(), None);
    assert_eq!(params(16, 0, 16).dram_size(), None);
    assert_eq!(params(0, 0, 0).known_bus_width(), None);
}
