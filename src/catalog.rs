//! DMC Thread Catalog
//!
//! Loads the fixed list of named thread colors. The on-disk format is a
//! sequence of 3-line records:
//!
//! ```text
//! 310
//! Black
//! 000000
//! ```
//!
//! The built-in catalog is embedded from `src/data/dmc.txt` and parsed once.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use crate::error::{Result, PatternError};

/// One named thread color. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub name: String,
    pub rgb: (u8, u8, u8),
}

impl CatalogEntry {
    pub fn new(code: impl Into<String>, name: impl Into<String>, rgb: (u8, u8, u8)) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            rgb,
        }
    }

    /// Lowercase `rrggbb`, the form the catalog file stores.
    pub fn hex(&self) -> String {
        rgb_hex(self.rgb)
    }
}

pub fn rgb_hex(rgb: (u8, u8, u8)) -> String {
    format!("{:02x}{:02x}{:02x}", rgb.0, rgb.1, rgb.2)
}

/// Ordered catalog. Iteration order is file order, which the resolver's
/// tie-break depends on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

static BUILTIN: OnceLock<std::result::Result<Catalog, String>> = OnceLock::new();

impl Catalog {
    /// Build a catalog from already-parsed entries, rejecting duplicate codes.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.code.as_str()) {
                return Err(PatternError::CatalogUnavailable(format!(
                    "duplicate code '{}'",
                    entry.code
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Parse the 3-line record format.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if lines.len() % 3 != 0 {
            return Err(PatternError::CatalogUnavailable(format!(
                "{} non-empty lines do not form whole code/name/hex records",
                lines.len()
            )));
        }

        let mut entries = Vec::with_capacity(lines.len() / 3);
        for (record, chunk) in lines.chunks(3).enumerate() {
            let (code, name, hex) = (chunk[0], chunk[1], chunk[2]);
            let rgb = parse_hex(hex).ok_or_else(|| {
                PatternError::CatalogUnavailable(format!(
                    "record {} ({}): '{}' is not a 6-digit hex color",
                    record + 1,
                    code,
                    hex
                ))
            })?;
            entries.push(CatalogEntry::new(code, name, rgb));
        }

        Self::from_entries(entries)
    }

    /// Load a catalog file from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PatternError::CatalogUnavailable(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// The embedded DMC catalog.
    pub fn builtin() -> Result<&'static Catalog> {
        BUILTIN
            .get_or_init(|| Catalog::parse(include_str!("data/dmc.txt")).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| PatternError::CatalogUnavailable(e.clone()))
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Exactly six hex digits, optionally prefixed with `#`.
fn parse_hex(s: &str) -> Option<(u8, u8, u8)> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_records() {
        let catalog = Catalog::parse("310\nBlack\n000000\n\n666\nBright Red\n#EC2130\n").unwrap();
        assert_eq!(
            catalog.entries(),
            &[
                CatalogEntry::new("310", "Black", (0, 0, 0)),
                CatalogEntry::new("666", "Bright Red", (236, 33, 48)),
            ]
        );
        assert_eq!(catalog.entries()[1].hex(), "ec2130");
    }

    #[test]
    fn test_parse_empty_text() {
        let catalog = Catalog::parse("").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_incomplete_record_rejected() {
        let err = Catalog::parse("310\nBlack\n").unwrap_err();
        assert!(matches!(err, PatternError::CatalogUnavailable(_)));
    }

    #[test]
    fn test_bad_hex_rejected() {
        for hex in ["00000", "0000000", "00zz00", "#12345"] {
            let text = format!("310\nBlack\n{}\n", hex);
            let err = Catalog::parse(&text).unwrap_err();
            assert!(matches!(err, PatternError::CatalogUnavailable(_)), "accepted {}", hex);
        }
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let err = Catalog::parse("310\nBlack\n000000\n310\nAlso Black\n010101\n").unwrap_err();
        assert!(matches!(err, PatternError::CatalogUnavailable(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Catalog::from_file(Path::new("/nonexistent/dmc.txt")).unwrap_err();
        assert!(matches!(err, PatternError::CatalogUnavailable(_)));
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.len() > 100);
        let black = catalog
            .entries()
            .iter()
            .find(|e| e.code == "310")
            .expect("310 should be present");
        assert_eq!(black.rgb, (0, 0, 0));
        assert_eq!(black.name, "Black");
    }
}
