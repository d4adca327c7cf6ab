//! Nearest-match resolution against the thread catalog.
//!
//! Plain Euclidean distance in RGB space. The scan replaces the best match
//! only on a strictly smaller distance, so among equidistant entries the one
//! earliest in catalog order wins.

use crate::catalog::{Catalog, CatalogEntry};
use crate::error::{Result, PatternError};

/// Euclidean distance between two RGB triples
pub fn distance(a: (u8, u8, u8), b: (u8, u8, u8)) -> f64 {
    let dr = a.0 as f64 - b.0 as f64;
    let dg = a.1 as f64 - b.1 as f64;
    let db = a.2 as f64 - b.2 as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Catalog entry closest to `rgb`.
pub fn resolve(rgb: (u8, u8, u8), catalog: &Catalog) -> Result<&CatalogEntry> {
    resolve_in(rgb, catalog.entries())
}

/// Same as [`resolve`] over a bare slice.
pub fn resolve_in(rgb: (u8, u8, u8), entries: &[CatalogEntry]) -> Result<&CatalogEntry> {
    let mut best: Option<(&CatalogEntry, f64)> = None;

    for entry in entries {
        let d = distance(rgb, entry.rgb);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((entry, d)),
        }
    }

    best.map(|(entry, _)| entry).ok_or(PatternError::EmptyCatalog)
}
