//! Adaptive Color Quantization
//!
//! Reduces an image to at most N representative colors and returns a
//! per-pixel index grid plus the representatives actually used.
//!
//! The reducer only depends on the [`Quantizer`] trait. [`MedianCut`] is the
//! built-in implementation:
//! 1. Exact-color histogram (ordered, so runs are reproducible)
//! 2. Split the heaviest, widest box at the weighted median of its widest channel
//! 3. Representative = weighted mean of each box
//! 4. Palette indices assigned in row-major order of first appearance

use image::RgbImage;
use std::collections::{BTreeMap, HashMap};
use crate::error::{Result, PatternError};

/// Most representatives a single quantization may produce.
pub const MAX_COLORS: usize = 256;

// ============================================================================
// PALETTE
// ============================================================================

/// Ordered representative colors with an index <-> RGB table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<(u8, u8, u8)>,
    lookup: HashMap<(u8, u8, u8), usize>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `rgb`, appending it if unseen.
    pub fn intern(&mut self, rgb: (u8, u8, u8)) -> usize {
        if let Some(&idx) = self.lookup.get(&rgb) {
            return idx;
        }
        let idx = self.colors.len();
        self.colors.push(rgb);
        self.lookup.insert(rgb, idx);
        idx
    }

    pub fn color(&self, index: usize) -> Option<(u8, u8, u8)> {
        self.colors.get(index).copied()
    }

    pub fn colors(&self) -> &[(u8, u8, u8)] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl FromIterator<(u8, u8, u8)> for Palette {
    fn from_iter<I: IntoIterator<Item = (u8, u8, u8)>>(iter: I) -> Self {
        let mut palette = Palette::new();
        for rgb in iter {
            palette.intern(rgb);
        }
        palette
    }
}

// ============================================================================
// QUANTIZED IMAGE
// ============================================================================

/// Grid of palette indices, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedImage {
    width: u32,
    height: u32,
    indices: Vec<usize>,
    palette: Palette,
    counts: Vec<u32>,
}

impl QuantizedImage {
    /// Validates that the grid is complete and every index is in the palette.
    pub fn new(width: u32, height: u32, indices: Vec<usize>, palette: Palette) -> Result<Self> {
        let expected = width as usize * height as usize;
        if indices.len() != expected {
            return Err(PatternError::Processing(format!(
                "index grid has {} cells, expected {}x{}",
                indices.len(),
                width,
                height
            )));
        }

        let mut counts = vec![0u32; palette.len()];
        for &idx in &indices {
            let slot = counts.get_mut(idx).ok_or_else(|| {
                PatternError::Processing(format!(
                    "palette index {} out of range ({} colors)",
                    idx,
                    palette.len()
                ))
            })?;
            *slot += 1;
        }

        Ok(Self {
            width,
            height,
            indices,
            palette,
            counts,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn index_at(&self, x: u32, y: u32) -> usize {
        self.indices[(y * self.width + x) as usize]
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Pixels per palette index
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Representatives paired with their pixel counts, in palette order.
    pub fn colors_with_counts(&self) -> impl Iterator<Item = (usize, (u8, u8, u8), u32)> + '_ {
        self.palette
            .colors()
            .iter()
            .zip(&self.counts)
            .enumerate()
            .map(|(idx, (&rgb, &count))| (idx, rgb, count))
    }

    /// Expand back to RGB using the representative colors.
    pub fn to_rgb_image(&self) -> RgbImage {
        let colors = self.palette.colors();
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let (r, g, b) = colors[self.index_at(x, y)];
            image::Rgb([r, g, b])
        })
    }
}

// ============================================================================
// QUANTIZER
// ============================================================================

/// "Reduce to N representative colors" collaborator.
///
/// Implementations must be deterministic for the reducer's results to be
/// reproducible.
pub trait Quantizer {
    fn quantize(&self, image: &RgbImage, colors: usize) -> Result<QuantizedImage>;
}

/// Weighted median-cut quantizer in RGB space.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianCut;

impl Quantizer for MedianCut {
    fn quantize(&self, image: &RgbImage, colors: usize) -> Result<QuantizedImage> {
        let colors = colors.clamp(1, MAX_COLORS);
        let (width, height) = image.dimensions();

        let mut histogram: BTreeMap<(u8, u8, u8), u32> = BTreeMap::new();
        for pixel in image.pixels() {
            *histogram.entry((pixel[0], pixel[1], pixel[2])).or_insert(0) += 1;
        }

        let boxes = median_cut(histogram.into_iter().collect(), colors);

        let mut representative: HashMap<(u8, u8, u8), (u8, u8, u8)> = HashMap::new();
        for b in &boxes {
            let rep = b.centroid();
            for &(rgb, _) in &b.entries {
                representative.insert(rgb, rep);
            }
        }

        let mut palette = Palette::new();
        let mut indices = Vec::with_capacity(width as usize * height as usize);
        for pixel in image.pixels() {
            let rgb = (pixel[0], pixel[1], pixel[2]);
            let rep = representative.get(&rgb).copied().ok_or_else(|| {
                PatternError::Processing(format!("color {:?} missing from median-cut boxes", rgb))
            })?;
            indices.push(palette.intern(rep));
        }

        QuantizedImage::new(width, height, indices, palette)
    }
}

/// A box of histogram entries (color, pixel count).
#[derive(Debug, Clone)]
struct ColorBox {
    entries: Vec<((u8, u8, u8), u32)>,
}

impl ColorBox {
    fn weight(&self) -> u64 {
        self.entries.iter().map(|&(_, w)| w as u64).sum()
    }

    fn ranges(&self) -> [u8; 3] {
        let mut min = [u8::MAX; 3];
        let mut max = [u8::MIN; 3];
        for &(rgb, _) in &self.entries {
            let c = [rgb.0, rgb.1, rgb.2];
            for ch in 0..3 {
                min[ch] = min[ch].min(c[ch]);
                max[ch] = max[ch].max(c[ch]);
            }
        }
        [
            max[0].saturating_sub(min[0]),
            max[1].saturating_sub(min[1]),
            max[2].saturating_sub(min[2]),
        ]
    }

    /// Channel with the widest range; red, then green, on ties.
    fn widest_channel(&self) -> usize {
        let [r, g, b] = self.ranges();
        if r >= g && r >= b {
            0
        } else if g >= b {
            1
        } else {
            2
        }
    }

    fn priority(&self) -> u64 {
        let ranges = self.ranges();
        let widest = ranges.iter().copied().max().unwrap_or(0);
        self.weight() * widest as u64
    }

    /// Weighted mean, rounded to nearest.
    fn centroid(&self) -> (u8, u8, u8) {
        let w = self.weight().max(1);
        let mut sum = [0u64; 3];
        for &(rgb, count) in &self.entries {
            sum[0] += rgb.0 as u64 * count as u64;
            sum[1] += rgb.1 as u64 * count as u64;
            sum[2] += rgb.2 as u64 * count as u64;
        }
        let avg = |s: u64| ((s + w / 2) / w).min(255) as u8;
        (avg(sum[0]), avg(sum[1]), avg(sum[2]))
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let axis = self.widest_channel();
        let channel = |rgb: (u8, u8, u8)| match axis {
            0 => rgb.0,
            1 => rgb.1,
            _ => rgb.2,
        };
        self.entries.sort_by_key(|&(rgb, _)| (channel(rgb), rgb));

        let half = self.weight() / 2;
        let mut accumulated = 0u64;
        let mut split_idx = 1;
        for (i, &(_, w)) in self.entries.iter().enumerate() {
            accumulated += w as u64;
            if accumulated >= half && i + 1 < self.entries.len() {
                split_idx = i + 1;
                break;
            }
        }
        split_idx = split_idx.clamp(1, self.entries.len() - 1);

        let right = self.entries.split_off(split_idx);
        (self, ColorBox { entries: right })
    }
}

/// Split the histogram into at most `max_colors` boxes.
fn median_cut(histogram: Vec<((u8, u8, u8), u32)>, max_colors: usize) -> Vec<ColorBox> {
    if histogram.is_empty() {
        return Vec::new();
    }

    if histogram.len() <= max_colors {
        return histogram
            .into_iter()
            .map(|entry| ColorBox { entries: vec![entry] })
            .collect();
    }

    let mut boxes = vec![ColorBox { entries: histogram }];

    while boxes.len() < max_colors {
        let mut best: Option<(usize, u64)> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.entries.len() < 2 {
                continue;
            }
            let p = b.priority();
            match best {
                Some((_, best_p)) if p <= best_p => {}
                _ => best = Some((i, p)),
            }
        }

        let Some((idx, _)) = best else {
            break; // every box is a single color
        };

        let (left, right) = boxes.remove(idx).split();
        boxes.insert(idx, right);
        boxes.insert(idx, left);
    }

    boxes
}
