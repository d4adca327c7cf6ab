//! Color key output: which thread each chart number stands for.

use serde::Serialize;
use crate::catalog::rgb_hex;
use crate::error::Result;
use crate::reducer::MatchedPalette;

#[derive(Debug, Clone, Serialize)]
pub struct KeyRow {
    pub index: u32,
    pub code: String,
    pub name: String,
    pub rgb: (u8, u8, u8),
    pub hex: String,
    pub source_rgb: (u8, u8, u8),
    pub source_hex: String,
    pub count: u32,
}

pub fn key_rows(palette: &MatchedPalette) -> Vec<KeyRow> {
    palette
        .colors()
        .iter()
        .map(|c| KeyRow {
            index: c.display_index,
            code: c.entry.code.clone(),
            name: c.entry.name.clone(),
            rgb: c.entry.rgb,
            hex: c.entry.hex(),
            source_rgb: c.source_rgb,
            source_hex: rgb_hex(c.source_rgb),
            count: c.pixel_count,
        })
        .collect()
}

fn rgb_str(rgb: (u8, u8, u8)) -> String {
    format!("({}, {}, {})", rgb.0, rgb.1, rgb.2)
}

/// `key.txt` layout: Index, DMC Code, DMC Name, RGB, Count.
pub fn text_key(palette: &MatchedPalette) -> String {
    let mut out = format!(
        "{:<8}{:<10}{:<30}{:<18}{:<10}\n",
        "Index", "DMC Code", "DMC Name", "RGB", "Count"
    );
    for row in key_rows(palette) {
        out.push_str(&format!(
            "{:<8}{:<10}{:<30}{:<18}{:<10}\n",
            row.index,
            row.code,
            row.name,
            rgb_str(row.rgb),
            row.count
        ));
    }
    out
}

/// Wider console table that also shows hex values and the source color.
pub fn summary_table(palette: &MatchedPalette) -> String {
    let mut out = format!(
        "{:<8}{:<10}{:<25}{:<18}{:<10}{:<18}{:<15}{:<15}\n",
        "Index", "DMC Code", "DMC Name", "DMC RGB", "DMC HEX", "Actual RGB", "Actual HEX", "Count"
    );
    for row in key_rows(palette) {
        out.push_str(&format!(
            "{:<8}{:<10}{:<25}{:<18}{:<10}{:<18}{:<15}{:<15}\n",
            row.index,
            row.code,
            row.name,
            rgb_str(row.rgb),
            row.hex,
            rgb_str(row.source_rgb),
            row.source_hex,
            row.count
        ));
    }
    out
}

pub fn json_key(palette: &MatchedPalette) -> Result<String> {
    Ok(serde_json::to_string_pretty(&key_rows(palette))?)
}
