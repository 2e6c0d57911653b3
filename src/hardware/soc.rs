//! Identification of the Allwinner SoC variant from its version register.

use std::fmt;
use std::str::FromStr;

/// SoC version register; the upper 16 bits identify the SoC family.
pub const VER_REG: u32 = 0x01C0_0024;

/// When clear, the upper half of `VER_REG` reads as zero.
pub const VER_R_EN: u32 = 1 << 15;

/// Third word of the security ID; bits 12..16 tell the sun5i variants apart.
pub const SID_KEY2: u32 = 0x01C2_3800 + 8;

/// The SoC families, named as in the board catalog.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SocType {
    Sun4i,
    Sun5i,
    Sun6i,
    Sun7i,
    Sun8i,
}

impl SocType {
    pub fn as_str(self) -> &'static str {
        match self {
            SocType::Sun4i => "sun4i",
            SocType::Sun5i => "sun5i",
            SocType::Sun6i => "sun6i",
            SocType::Sun7i => "sun7i",
            SocType::Sun8i => "sun8i",
        }
    }

    /// Look up the family by the upper 16 bits of `VER_REG`
    pub fn from_version(version: u16) -> Option<Self> {
        match version {
            0x1623 => Some(SocType::Sun4i),
            0x1625 => Some(SocType::Sun5i),
            0x1633 => Some(SocType::Sun6i),
            0x1650 => Some(SocType::Sun8i),
            0x1651 => Some(SocType::Sun7i),
            _ => None,
        }
    }
}

impl fmt::Display for SocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "sun4i" => Ok(SocType::Sun4i),
            "sun5i" => Ok(SocType::Sun5i),
            "sun6i" => Ok(SocType::Sun6i),
            "sun7i" => Ok(SocType::Sun7i),
            "sun8i" => Ok(SocType::Sun8i),
            _ => anyhow::bail!("unknown SoC type `{s}`"),
        }
    }
}

/// Identify the SoC from the (enabled) version register value.
///
/// The sun5i family shares one version code between A10s, A12 and A13; for that family
/// `read_sid_key2` is called to tell them apart. If it returns `None`, the name stays unknown.
pub fn identify(
    version_reg: u32,
    read_sid_key2: impl FnOnce() -> Option<u32>,
) -> (Option<SocType>, Option<&'static str>) {
    let Some(soc_type) = SocType::from_version((version_reg >> 16) as u16) else {
        return (None, None);
    };

    let soc_name = match soc_type {
        SocType::Sun4i => Some("Allwinner A10"),
        SocType::Sun5i => read_sid_key2().and_then(|key| match (key >> 12) & 0xF {
            0 => Some("Allwinner A12"),
            3 => Some("Allwinner A13"),
            7 => Some("Allwinner A10s"),
            _ => None,
        }),
        SocType::Sun6i => Some("Allwinner A31(s)"),
        SocType::Sun7i => Some("Allwinner A20"),
        SocType::Sun8i => Some("Allwinner A23"),
    };

    (Some(soc_type), soc_name)
}

#[test]
fn test_identify_families() {
    let no_sid = || -> Option<u32> { panic!("SID should only be read on sun5i") };

    assert_eq!(
        identify(0x1623_8000, no_sid),
        (Some(SocType::Sun4i), Some("Allwinner A10"))
    );
    assert_eq!(
        identify(0x1633_8000, no_sid),
        (Some(SocType::Sun6i), Some("Allwinner A31(s)"))
    );
    assert_eq!(
        identify(0x1650_8000, no_sid),
        (Some(SocType::Sun8i), Some("Allwinner A23"))
    );
    assert_eq!(
        identify(0x1651_8000, no_sid),
        (Some(SocType::Sun7i), Some("Allwinner A20"))
    );
    assert_eq!(identify(0x1234_8000, no_sid), (None, None));
}

#[test]
fn test_identify_sun5i_variants() {
    let sun5i = |key2: Option<u32>| identify(0x1625_8000, || key2);

    assert_eq!(sun5i(Some(0x0000_0000)).1, Some("Allwinner A12"));
    assert_eq!(sun5i(Some(0x1234_3abc)).1, Some("Allwinner A13"));
    assert_eq!(sun5i(Some(0x0000_7000)).1, Some("Allwinner A10s"));
    assert_eq!(sun5i(Some(0x0000_5000)), (Some(SocType::Sun5i), None));
    assert_eq!(sun5i(None), (Some(SocType::Sun5i), None));
}

#[test]
fn test_soc_type_names() -> anyhow::Result<()> {
    for soc in [
        SocType::Sun4i,
        SocType::Sun5i,
        SocType::Sun6i,
        SocType::Sun7i,
        SocType::Sun8i,
    ] {
        assert_eq!(soc.as_str().parse::<SocType>()?, soc);
    }
    assert!("sun9i".parse::<SocType>().is_err());
    Ok(())
}
