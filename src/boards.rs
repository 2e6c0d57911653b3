//! The board catalog, `sunxi-boards.cfg`, and matching boards against the detected hardware.
//!
//! The catalog is a line-oriented text file shipped next to the U-Boot binaries:
//!
//! ```text
//! # Board name        SoC     DRAM
//! Cubieboard          sun4i   1024 MiB (32-bit)
//! A13-OLinuXino-Micro sun5i   256 MiB (16-bit)
//! ```
//!
//! Lines that do not look like this are ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dialog::MenuItems;
use crate::hardware::{HardwareInfo, SocType};

/// One data line of the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardEntry {
    pub name: String,
    pub soc_type: String,
    pub dram_size_mib: u32,
    pub dram_bus_width: u32,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("can't load '{}'", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\S+)\s+(\S+)\s+(\d+)\s*MiB\s*\((\d+)-bit\)").unwrap()
    })
}

impl BoardEntry {
    /// Parse a catalog line. Comments and lines of any other shape give `None`.
    pub fn parse(line: &str) -> Option<Self> {
        if line.trim_start().starts_with('#') {
            return None;
        }

        let caps = line_pattern().captures(line)?;
        Some(Self {
            name: caps[1].to_string(),
            soc_type: caps[2].to_string(),
            dram_size_mib: caps[3].parse().ok()?,
            dram_bus_width: caps[4].parse().ok()?,
        })
    }
}

/// What to look for in the catalog. `None` criteria match any board.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BoardQuery {
    pub soc_type: Option<SocType>,
    pub dram_size: Option<u32>,
    pub dram_bus_width: Option<u32>,
}

impl From<&HardwareInfo> for BoardQuery {
    fn from(info: &HardwareInfo) -> Self {
        Self {
            soc_type: info.soc_type,
            dram_size: info.dram_size,
            dram_bus_width: info.dram_bus_width,
        }
    }
}

impl BoardQuery {
    pub fn matches(&self, entry: &BoardEntry) -> bool {
        self.soc_type.map_or(true, |soc| entry.soc_type == soc.as_str())
            && self.dram_size.map_or(true, |size| entry.dram_size_mib == size)
            && self
                .dram_bus_width
                .map_or(true, |width| entry.dram_bus_width == width)
    }
}

/// Parse a whole catalog, skipping comments and malformed lines
pub fn parse_catalog(text: &str) -> impl Iterator<Item = BoardEntry> + '_ {
    text.lines().filter_map(BoardEntry::parse)
}

/// Find the boards in the catalog at `path` compatible with `query`.
///
/// The result is ready for use as a menu: board names mapped to empty labels. A readable catalog
/// with no compatible boards gives an empty map; only a missing or unreadable file is an error.
pub fn find_matches(path: &Path, query: &BoardQuery) -> Result<MenuItems, CatalogError> {
    let text = fs::read_to_string(path).map_err(|source| {
        warn!(path = %path.display(), %source, "board catalog is unreadable");
        CatalogError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let matches: MenuItems = parse_catalog(&text)
        .filter(|entry| query.matches(entry))
        .map(|entry| (entry.name, String::new()))
        .collect();

    debug!(?query, count = matches.len(), "matched boards");
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG: &str = "\
# Generated list of supported boards
#  name     soc    dram
board-a     sun4i  512MiB (16-bit)
board-b     sun5i  1024 MiB (32-bit)
   # board-c sun4i 512MiB (16-bit)
board-d sun4i 512MiB
garbage line
board-e\tsun7i\t1024  MiB  (32-bit)
";

    fn catalog_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn names(items: &MenuItems) -> Vec<&str> {
        items.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            BoardEntry::parse("Cubieboard sun4i 1024MiB (32-bit)"),
            Some(BoardEntry {
                name: "Cubieboard".into(),
                soc_type: "sun4i".into(),
                dram_size_mib: 1024,
                dram_bus_width: 32,
            })
        );
        assert_eq!(BoardEntry::parse("# Cubieboard sun4i 1024MiB (32-bit)"), None);
        assert_eq!(BoardEntry::parse("Cubieboard sun4i 1024MiB"), None);
        assert_eq!(BoardEntry::parse("Cubieboard sun4i lots MiB (32-bit)"), None);
        assert_eq!(BoardEntry::parse(""), None);
    }

    #[test]
    fn test_parse_catalog() {
        let names: Vec<_> = parse_catalog(CATALOG).map(|entry| entry.name).collect();
        assert_eq!(names, ["board-a", "board-b", "board-e"]);
    }

    #[test]
    fn test_find_exact_match() {
        let file = catalog_file(CATALOG);
        let query = BoardQuery {
            soc_type: Some(SocType::Sun4i),
            dram_size: Some(512),
            dram_bus_width: Some(16),
        };

        let matches = find_matches(file.path(), &query).unwrap();
        assert_eq!(names(&matches), ["board-a"]);
        assert_eq!(matches["board-a"], "");
    }

    #[test]
    fn test_find_unknown_criteria_widen() {
        let file = catalog_file(CATALOG);

        let all = find_matches(file.path(), &BoardQuery::default()).unwrap();
        assert_eq!(names(&all), ["board-a", "board-b", "board-e"]);

        let query = BoardQuery {
            dram_size: Some(1024),
            dram_bus_width: Some(32),
            ..Default::default()
        };
        let matches = find_matches(file.path(), &query).unwrap();
        assert_eq!(names(&matches), ["board-b", "board-e"]);
    }

    #[test]
    fn test_find_no_match() {
        let file = catalog_file(CATALOG);
        let query = BoardQuery {
            soc_type: Some(SocType::Sun6i),
            ..Default::default()
        };

        let matches = find_matches(file.path(), &query).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_find_missing_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sunxi-boards.cfg");

        let err = find_matches(&path, &BoardQuery::default()).unwrap_err();
        assert_eq!(err.to_string(), format!("can't load '{}'", path.display()));
    }

    #[test]
    fn test_query_from_hardware() {
        let info = HardwareInfo {
            soc_type: Some(SocType::Sun5i),
            dram_size: Some(512),
            dram_bus_width: None,
            ..Default::default()
        };
        assert_eq!(
            BoardQuery::from(&info),
            BoardQuery {
                soc_type: Some(SocType::Sun5i),
                dram_size: Some(512),
                dram_bus_width: None,
            }
        );
    }
}
