//! Detection of the Allwinner SoC variant and its DRAM configuration.
//!
//! Detection is best-effort. Nothing in here returns an error: whatever cannot be determined is
//! left as `None` in [`HardwareInfo`], and unknown facts later widen the list of candidate boards
//! instead of narrowing it.

pub mod devmem;
pub mod meminfo;
pub mod soc;

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::config::Settings;

use self::devmem::DevMem;
use self::meminfo::DramParams;
pub use self::soc::SocType;
use self::soc::{SID_KEY2, VER_REG, VER_R_EN};

pub const UNKNOWN_HARDWARE: &str = "Unknown hardware";

/// Everything we managed to find out about the running hardware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareInfo {
    pub soc_type: Option<SocType>,
    pub soc_name: Option<&'static str>,
    /// DRAM clock in MHz
    pub dram_clock: Option<u32>,
    /// MBUS clock in MHz
    pub mbus_clock: Option<u32>,
    /// DRAM size in MiB
    pub dram_size: Option<u32>,
    /// DRAM bus width in bits
    pub dram_bus_width: Option<u32>,
    /// One-line description, used as the title of every dialog
    pub summary: String,
}

impl Default for HardwareInfo {
    fn default() -> Self {
        Self {
            soc_type: None,
            soc_name: None,
            dram_clock: None,
            mbus_clock: None,
            dram_size: None,
            dram_bus_width: None,
            summary: UNKNOWN_HARDWARE.into(),
        }
    }
}

impl HardwareInfo {
    fn summarize(&self) -> String {
        let mut summary = format!("SoC: {}", self.soc_name.unwrap_or("unknown"));

        if let Some(dram_clock) = self.dram_clock {
            let or_unknown = |x: Option<u32>| x.map_or("?".to_string(), |x| x.to_string());
            summary += &format!(
                ", DRAM: {} MiB, {}-bit, {dram_clock} MHz",
                or_unknown(self.dram_size),
                or_unknown(self.dram_bus_width),
            );
        }

        if let Some(mbus_clock) = self.mbus_clock.filter(|&clk| clk != 0) {
            summary += &format!(", MBUS: {mbus_clock} MHz");
        }

        summary
    }
}

/// The sources the prober reads from.
///
/// Each method returns `None` if the information is unavailable, for whatever reason.
pub trait HardwareAccess {
    /// Contents of the hardware identification source (`/proc/cpuinfo`)
    fn cpuinfo(&mut self) -> Option<String>;

    /// Read a 32-bit hardware register
    fn read_word(&mut self, addr: u32) -> Option<u32>;

    /// Write a 32-bit hardware register
    fn write_word(&mut self, addr: u32, value: u32) -> Option<()>;

    /// The DRAM controller report
    fn dram_report(&mut self) -> Option<String>;
}

/// [`HardwareAccess`] on a live system, through `/proc/cpuinfo`, `devmem2` and `a10-meminfo`
#[derive(Debug, Clone)]
pub struct SystemHardware {
    cpuinfo: PathBuf,
    devmem: DevMem,
    meminfo_program: String,
}

impl SystemHardware {
    pub fn new(settings: &Settings) -> Self {
        Self {
            cpuinfo: settings.cpuinfo.clone(),
            devmem: DevMem::new(settings.devmem_program.clone()),
            meminfo_program: settings.meminfo_program.clone(),
        }
    }
}

impl HardwareAccess for SystemHardware {
    fn cpuinfo(&mut self) -> Option<String> {
        fs::read_to_string(&self.cpuinfo).ok()
    }

    fn read_word(&mut self, addr: u32) -> Option<u32> {
        self.devmem.read_word(addr)
    }

    fn write_word(&mut self, addr: u32, value: u32) -> Option<()> {
        self.devmem.write_word(addr, value)
    }

    fn dram_report(&mut self) -> Option<String> {
        let output = Command::new(&self.meminfo_program).output().ok()?;
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// `sun<digit>i` anywhere in a line
fn sun_xi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"sun\di").unwrap())
}

/// Does this cpuinfo text describe Allwinner hardware?
pub fn is_sunxi_cpuinfo(cpuinfo: &str) -> bool {
    cpuinfo.lines().any(|line| {
        line.starts_with("Hardware")
            && (line.contains("Allwinner") || sun_xi_pattern().is_match(line))
    })
}

/// Probe the hardware. Never fails; see the module documentation.
pub fn probe(hw: &mut impl HardwareAccess) -> HardwareInfo {
    let mut info = HardwareInfo::default();

    if !hw.cpuinfo().is_some_and(|text| is_sunxi_cpuinfo(&text)) {
        info!("not running on Allwinner hardware");
        return info;
    }

    let Some(mut version) = hw.read_word(VER_REG) else {
        info!("SoC version register is unreadable");
        return info;
    };

    if version & VER_R_EN == 0 {
        // The version field reads as zero until VER_R_EN is set
        if hw.write_word(VER_REG, version | VER_R_EN).is_none() {
            debug!("enabling the SoC version register failed");
        }
        match hw.read_word(VER_REG) {
            Some(value) => version = value,
            None => {
                info!("SoC version register is unreadable after enabling it");
                return info;
            }
        }
    }
    debug!(version = format_args!("0x{version:08X}"), "SoC version register");

    let (soc_type, soc_name) = soc::identify(version, || hw.read_word(SID_KEY2));
    info.soc_type = soc_type;
    info.soc_name = soc_name;

    let dram = hw
        .dram_report()
        .map(|report| DramParams::parse(&report))
        .unwrap_or_default();
    info.dram_clock = dram.dram_clk;
    info.mbus_clock = dram.mbus_clk;
    info.dram_size = dram.dram_size();
    info.dram_bus_width = dram.known_bus_width();

    info.summary = info.summarize();
    info!(summary = %info.summary, "hardware probed");
    info
}


#[cfg(test)]
const SUNXI_CPUINFO: &str = "\
Processor\t: ARMv7 Processor rev 2 (v7l)
BogoMIPS\t: 1006.38
Features\t: swp half thumb fastmult vfp edsp neon vfpv3 tls
CPU implementer\t: 0x41
Hardware\t: sun5i
Revision\t: 0000
";

#[test]
fn test_is_sunxi_cpuinfo() {
    assert!(is_sunxi_cpuinfo(SUNXI_CPUINFO));
    assert!(is_sunxi_cpuinfo("Hardware\t: Allwinner sun7i (A20) Family\n"));
    assert!(is_sunxi_cpuinfo("Hardware\t: Allwinner A1X\n"));
    assert!(!is_sunxi_cpuinfo("Hardware\t: BCM2835\n"));
    assert!(!is_sunxi_cpuinfo("model name\t: sun4i\nHardware\t: Generic\n"));
    assert!(!is_sunxi_cpuinfo("Hardware\t: sunxi\n"));
    assert!(!is_sunxi_cpuinfo("Hardware\t: sunXi\n"));
    assert!(is_sunxi_cpuinfo("Hardware\t: sun8i\n"));
    assert!(is_sunxi_cpuinfo("Hardware\t: Generic DT based system (sun50iw1p1)\n"));
    assert!(!is_sunxi_cpuinfo(""));
}

#[test]
fn test_probe_not_sunxi() {
    use testing::FakeHardware;

    let mut hw = FakeHardware {
        cpuinfo: Some("Hardware\t: BCM2835\n".into()),
        ..Default::default()
    };
    hw.registers.insert(VER_REG, 0x1623_8000);

    assert_eq!(probe(&mut hw), HardwareInfo::default());
    assert!(hw.reads.is_empty());
    assert_eq!(probe(&mut hw).summary, "Unknown hardware");
}

#[test]
fn test_probe_unreadable_register() {
    use testing::FakeHardware;

    let mut hw = FakeHardware {
        cpuinfo: Some(SUNXI_CPUINFO.into()),
        dram_report: Some("dram_clk = 408\n".into()),
        ..Default::default()
    };

    assert_eq!(probe(&mut hw), HardwareInfo::default());
}

#[test]
fn test_probe_enables_version_register() {
    use testing::FakeHardware;

    let mut hw = FakeHardware {
        cpuinfo: Some(SUNXI_CPUINFO.into()),
        ..Default::default()
    };
    hw.registers.insert(VER_REG, 0x1651_8000);
    hw.gated.insert(VER_REG, false);

    let info = probe(&mut hw);
    assert_eq!(hw.writes, [(VER_REG, 0x0000_8000)]);
    assert_eq!(info.soc_type, Some(SocType::Sun7i));
    assert_eq!(info.soc_name, Some("Allwinner A20"));
    assert_eq!(info.summary, "SoC: Allwinner A20");
}

#[test]
fn test_probe_version_register_stays_disabled() {
    use testing::FakeHardware;

    let mut hw = FakeHardware {
        cpuinfo: Some(SUNXI_CPUINFO.into()),
        dram_report: Some("dram_clk = 408\ndram_bus_width = 32\n".into()),
        fail_writes: true,
        ..Default::default()
    };
    hw.registers.insert(VER_REG, 0x1651_8000);
    hw.gated.insert(VER_REG, false);

    let info = probe(&mut hw);
    assert_eq!(hw.writes, [(VER_REG, 0x0000_8000)]);
    assert_eq!(hw.reads[..2], [VER_REG, VER_REG]);
    assert_eq!(info.soc_type, None);
    assert_eq!(info.dram_clock, Some(408));
    assert_eq!(info.summary, "SoC: unknown, DRAM: ? MiB, 32-bit, 408 MHz");
}

#[test]
fn test_probe_full() {
    use testing::FakeHardware;

    let mut hw = FakeHardware {
        cpuinfo: Some(SUNXI_CPUINFO.into()),
        dram_report: Some(
            "dram_clk = 432\nmbus_clk = 0\ndram_chip_density = 2048\n\
             dram_io_width = 8\ndram_bus_width = 16\n"
                .into(),
        ),
        ..Default::default()
    };
    hw.registers.insert(VER_REG, 0x1625_8000);
    hw.registers.insert(SID_KEY2, 0x0000_3000);

    let info = probe(&mut hw);
    assert!(hw.writes.is_empty());
    assert_eq!(
        info,
        HardwareInfo {
            soc_type: Some(SocType::Sun5i),
            soc_name: Some("Allwinner A13"),
            dram_clock: Some(432),
            mbus_clock: Some(0),
            dram_size: Some(512),
            dram_bus_width: Some(16),
            summary: "SoC: Allwinner A13, DRAM: 512 MiB, 16-bit, 432 MHz".into(),
        }
    );
}

#[test]
fn test_summary() {
    let mut info = HardwareInfo {
        soc_type: Some(SocType::Sun4i),
        soc_name: Some("Allwinner A10"),
        mbus_clock: Some(300),
        ..Default::default()
    };
    assert_eq!(info.summarize(), "SoC: Allwinner A10, MBUS: 300 MHz");

    info.dram_clock = Some(360);
    info.dram_bus_width = Some(32);
    assert_eq!(
        info.summarize(),
        "SoC: Allwinner A10, DRAM: ? MiB, 32-bit, 360 MHz, MBUS: 300 MHz"
    );

    info.soc_name = None;
    info.mbus_clock = None;
    info.dram_size = Some(1024);
    assert_eq!(
        info.summarize(),
        "SoC: unknown, DRAM: 1024 MiB, 32-bit, 360 MHz"
    );
}
