//! Pixel remapping: quantized grid -> thread colors.
//!
//! Reuses the representative -> thread mapping fixed by the reducer instead
//! of resolving again, so the chart, key and output image always agree.

use image::{Rgb, RgbImage};
use crate::error::{Result, PatternError};
use crate::quantize::QuantizedImage;
use crate::reducer::MatchedPalette;

/// Paint every cell with its matched thread's RGB.
pub fn remap(quantized: &QuantizedImage, matched: &MatchedPalette) -> Result<RgbImage> {
    let (width, height) = quantized.dimensions();
    let mut out = RgbImage::new(width, height);

    for (pixel, &idx) in out.pixels_mut().zip(quantized.indices()) {
        let color = matched.color_for(idx).ok_or_else(|| unmapped(idx))?;
        let (r, g, b) = color.entry.rgb;
        *pixel = Rgb([r, g, b]);
    }

    Ok(out)
}

/// Display index of every cell, row-major. Used to number the chart.
pub fn display_grid(quantized: &QuantizedImage, matched: &MatchedPalette) -> Result<Vec<usize>> {
    quantized
        .indices()
        .iter()
        .map(|&idx| matched.display_index_for(idx).ok_or_else(|| unmapped(idx)))
        .collect()
}

fn unmapped(idx: usize) -> PatternError {
    PatternError::Processing(format!("quantized color {} has no matched thread", idx))
}
