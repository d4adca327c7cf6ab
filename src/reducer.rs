//! Adaptive Palette Reduction
//!
//! Quantizes the source at increasing levels until the number of distinct
//! catalog matches equals the requested color count, or the level ceiling
//! is reached.
//!
//! Several representatives often resolve to the same thread, so asking the
//! quantizer for exactly N colors usually yields fewer than N threads.
//! Raising the level adds representative diversity until enough distinct
//! matches appear.
//!
//! Cost is bounded by `max_levels x pixels x catalog size`: every level
//! re-quantizes the whole image and resolves each representative with a
//! linear catalog scan.

use image::RgbImage;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};
use crate::catalog::{Catalog, CatalogEntry};
use crate::error::{Result, PatternError};
use crate::quantize::{QuantizedImage, Quantizer, MAX_COLORS};
use crate::resolver::resolve;

// ============================================================================
// MATCHED PALETTE
// ============================================================================

/// One thread in the finished pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedColor {
    /// Dense 0..N-1 number shown on the chart
    pub display_index: u32,
    pub entry: CatalogEntry,
    /// First representative that resolved to this entry
    pub source_rgb: (u8, u8, u8),
    /// Cells stitched with this entry, across every representative that collapsed onto it
    pub pixel_count: u32,
}

/// Threads with pairwise distinct codes, plus the mapping from quantized
/// palette index to display index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchedPalette {
    colors: Vec<MatchedColor>,
    by_quantized: Vec<usize>,
}

impl MatchedPalette {
    /// Resolve every representative of `quantized` and collapse duplicates.
    ///
    /// Representatives are visited in palette order; the first one to reach a
    /// catalog entry owns its record and display index.
    pub fn build(quantized: &QuantizedImage, catalog: &Catalog) -> Result<Self> {
        let mut colors: Vec<MatchedColor> = Vec::new();
        let mut by_code: HashMap<&str, usize> = HashMap::new();
        let mut by_quantized = Vec::with_capacity(quantized.palette().len());

        for (_, rgb, count) in quantized.colors_with_counts() {
            let entry = resolve(rgb, catalog)?;
            let slot = match by_code.get(entry.code.as_str()) {
                Some(&slot) => {
                    colors[slot].pixel_count += count;
                    slot
                }
                None => {
                    let slot = colors.len();
                    colors.push(MatchedColor {
                        display_index: slot as u32,
                        entry: entry.clone(),
                        source_rgb: rgb,
                        pixel_count: count,
                    });
                    by_code.insert(entry.code.as_str(), slot);
                    slot
                }
            };
            by_quantized.push(slot);
        }

        Ok(Self {
            colors,
            by_quantized,
        })
    }

    pub fn colors(&self) -> &[MatchedColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Display index for a quantized palette index
    pub fn display_index_for(&self, quantized_index: usize) -> Option<usize> {
        self.by_quantized.get(quantized_index).copied()
    }

    /// Matched thread for a quantized palette index
    pub fn color_for(&self, quantized_index: usize) -> Option<&MatchedColor> {
        self.display_index_for(quantized_index)
            .and_then(|slot| self.colors.get(slot))
    }
}

// ============================================================================
// REDUCTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ReductionStatus {
    Converged,
    /// Ceiling hit first. The palette is the last one computed.
    UnreachableTargetCount {
        requested: usize,
        achieved: usize,
        ceiling: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub palette: MatchedPalette,
    pub quantized: QuantizedImage,
    /// Quantization level of the final iteration
    pub level: usize,
    pub iterations: usize,
    pub status: ReductionStatus,
}

impl Reduction {
    pub fn is_converged(&self) -> bool {
        self.status == ReductionStatus::Converged
    }

    /// Treat an unreachable target as an error.
    pub fn into_converged(self) -> Result<Self> {
        match self.status {
            ReductionStatus::Converged => Ok(self),
            ReductionStatus::UnreachableTargetCount {
                requested,
                achieved,
                ceiling,
            } => Err(PatternError::UnreachableTargetCount {
                requested,
                achieved,
                ceiling,
            }),
        }
    }
}

/// Highest level the search may climb to for a catalog of `catalog_len` entries.
pub fn default_max_levels(catalog_len: usize) -> usize {
    catalog_len.min(MAX_COLORS)
}

/// Search for the quantization level whose catalog matches number exactly `target`.
///
/// Starts at `level = target` and climbs by one per iteration. Stops at the
/// first level with `target` distinct matches, or once `level >= max_levels`,
/// so it runs at most `max_levels - target + 1` iterations (one if `target`
/// already exceeds the ceiling).
pub fn reduce<Q: Quantizer + ?Sized>(
    source: &RgbImage,
    target: usize,
    max_levels: usize,
    catalog: &Catalog,
    quantizer: &Q,
) -> Result<Reduction> {
    if target == 0 {
        return Err(PatternError::InvalidParameter(
            "target color count must be at least 1".to_string(),
        ));
    }
    if max_levels == 0 {
        return Err(PatternError::InvalidParameter(
            "quantization ceiling must be at least 1".to_string(),
        ));
    }
    if catalog.is_empty() {
        return Err(PatternError::EmptyCatalog);
    }

    let mut level = target;
    let mut iterations = 0;

    loop {
        iterations += 1;
        let quantized = quantizer.quantize(source, level)?;
        let palette = MatchedPalette::build(&quantized, catalog)?;

        debug!(
            level,
            representatives = quantized.palette().len(),
            matches = palette.len(),
            target,
            "quantization iteration"
        );

        if palette.len() == target {
            return Ok(Reduction {
                palette,
                quantized,
                level,
                iterations,
                status: ReductionStatus::Converged,
            });
        }

        if level >= max_levels {
            warn!(
                requested = target,
                achieved = palette.len(),
                ceiling = max_levels,
                "target color count unreachable, keeping last palette"
            );
            let status = ReductionStatus::UnreachableTargetCount {
                requested: target,
                achieved: palette.len(),
                ceiling: max_levels,
            };
            return Ok(Reduction {
                palette,
                quantized,
                level,
                iterations,
                status,
            });
        }

        level += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::{MedianCut, Palette};
    use image::Rgb;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Records every level it is asked for.
    struct Recording {
        levels: RefCell<Vec<usize>>,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                levels: RefCell::new(Vec::new()),
            }
        }
    }

    impl Quantizer for Recording {
        fn quantize(&self, image: &RgbImage, colors: usize) -> Result<QuantizedImage> {
            self.levels.borrow_mut().push(colors);
            MedianCut.quantize(image, colors)
        }
    }

    fn catalog(entries: &[(&str, (u8, u8, u8))]) -> Catalog {
        Catalog::from_entries(
            entries
                .iter()
                .map(|&(code, rgb)| CatalogEntry::new(code, code, rgb))
                .collect(),
        )
        .unwrap()
    }

    fn photo_like(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 7 % 256) as u8,
                (y * 11 % 256) as u8,
                ((x * y) % 256) as u8,
            ])
        })
    }

    #[test]
    fn test_red_green_converges_first_iteration() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([255, 0, 0]) } else { Rgb([0, 255, 0]) });
        let cat = catalog(&[("RED", (255, 0, 0)), ("GREEN", (0, 255, 0))]);

        let result = reduce(&img, 2, 2, &cat, &MedianCut).unwrap();

        assert_eq!(result.status, ReductionStatus::Converged);
        assert_eq!(result.level, 2);
        assert_eq!(result.iterations, 1);
        let colors = result.palette.colors();
        assert_eq!(colors.len(), 2);
        assert_eq!((colors[0].display_index, colors[0].entry.code.as_str()), (0, "RED"));
        assert_eq!((colors[1].display_index, colors[1].entry.code.as_str()), (1, "GREEN"));
        assert_eq!(colors[0].pixel_count, 1);
        assert_eq!(colors[1].source_rgb, (0, 255, 0));
    }

    #[test]
    fn test_solid_image_hits_ceiling() {
        let img = RgbImage::from_pixel(4, 4, Rgb([40, 80, 120]));
        let cat = catalog(&[("A", (0, 0, 0)), ("B", (40, 80, 120)), ("C", (255, 255, 255)), ("D", (255, 0, 0))]);
        let recorder = Recording::new();

        let result = reduce(&img, 3, 4, &cat, &recorder).unwrap();

        assert_eq!(
            result.status,
            ReductionStatus::UnreachableTargetCount {
                requested: 3,
                achieved: 1,
                ceiling: 4
            }
        );
        assert_eq!(result.palette.len(), 1);
        assert_eq!(result.palette.colors()[0].entry.code, "B");
        assert_eq!(result.palette.colors()[0].pixel_count, 16);
        assert_eq!(result.level, 4);
        assert_eq!(*recorder.levels.borrow(), vec![3, 4]);

        let err = result.into_converged().unwrap_err();
        assert!(matches!(
            err,
            PatternError::UnreachableTargetCount { requested: 3, achieved: 1, ceiling: 4 }
        ));
    }

    #[test]
    fn test_levels_climb_by_one_and_stay_bounded() {
        let img = photo_like(32, 24);
        let cat = Catalog::builtin().unwrap();
        let max_levels = 40;

        for target in [1, 4, 9, 20] {
            let recorder = Recording::new();
            let result = reduce(&img, target, max_levels, cat, &recorder).unwrap();
            let levels = recorder.levels.borrow();

            assert_eq!(levels[0], target);
            assert!(levels.windows(2).all(|w| w[1] == w[0] + 1), "levels {:?}", levels);
            assert!(levels.len() <= max_levels - target + 1);
            assert_eq!(result.iterations, levels.len());
            assert_eq!(result.level, *levels.last().unwrap());
        }
    }

    #[test]
    fn test_target_above_ceiling_runs_once() {
        let img = photo_like(16, 16);
        let cat = catalog(&[("A", (0, 0, 0)), ("B", (255, 255, 255))]);
        let recorder = Recording::new();

        let result = reduce(&img, 5, 2, &cat, &recorder).unwrap();

        assert_eq!(*recorder.levels.borrow(), vec![5]);
        assert!(!result.is_converged());
    }

    #[test]
    fn test_codes_unique() {
        let img = photo_like(48, 32);
        let cat = Catalog::builtin().unwrap();
        for target in [2, 6, 12] {
            let result = reduce(&img, target, default_max_levels(cat.len()), cat, &MedianCut).unwrap();
            let codes: HashSet<&str> = result.palette.colors().iter().map(|c| c.entry.code.as_str()).collect();
            assert_eq!(codes.len(), result.palette.len());
            let indices: Vec<u32> = result.palette.colors().iter().map(|c| c.display_index).collect();
            assert_eq!(indices, (0..result.palette.len() as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_idempotent() {
        let img = photo_like(30, 20);
        let cat = Catalog::builtin().unwrap();
        let a = reduce(&img, 5, 64, cat, &MedianCut).unwrap();
        let b = reduce(&img, 5, 64, cat, &MedianCut).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_collapsed_representatives_share_record() {
        // Two representatives, both nearest to "GRAY"
        let palette: Palette = [(120, 120, 120), (130, 130, 130), (0, 0, 0)].into_iter().collect();
        let quantized = QuantizedImage::new(4, 1, vec![0, 1, 1, 2], palette).unwrap();
        let cat = catalog(&[("GRAY", (125, 125, 125)), ("BLACK", (0, 0, 0))]);

        let matched = MatchedPalette::build(&quantized, &cat).unwrap();

        assert_eq!(matched.len(), 2);
        assert_eq!(matched.colors()[0].entry.code, "GRAY");
        assert_eq!(matched.colors()[0].source_rgb, (120, 120, 120));
        assert_eq!(matched.colors()[0].pixel_count, 3);
        assert_eq!(matched.colors()[1].entry.code, "BLACK");
        assert_eq!(matched.display_index_for(0), Some(0));
        assert_eq!(matched.display_index_for(1), Some(0));
        assert_eq!(matched.display_index_for(2), Some(1));
        assert_eq!(matched.display_index_for(3), None);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let img = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        let cat = catalog(&[("A", (0, 0, 0))]);
        assert!(matches!(reduce(&img, 0, 10, &cat, &MedianCut), Err(PatternError::InvalidParameter(_))));
        assert!(matches!(reduce(&img, 1, 0, &cat, &MedianCut), Err(PatternError::InvalidParameter(_))));
        assert!(matches!(
            reduce(&img, 1, 10, &Catalog::default(), &MedianCut),
            Err(PatternError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_default_max_levels() {
        assert_eq!(default_max_levels(192), 192);
        assert_eq!(default_max_levels(500), 256);
        assert_eq!(default_max_levels(3), 3);
    }
}
