//! Pattern Pipeline
//!
//! One parameterized run from photo to pattern:
//! 1. Downscale to the stitch grid width (bilinear)
//! 2. Adaptive palette reduction against the thread catalog
//! 3. Remap cells to thread colors
//! 4. Render chart + template, write the key
//!
//! `generate` works purely in memory; `run` adds file I/O around it.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use crate::catalog::Catalog;
use crate::error::{Result, PatternError};
use crate::key::{json_key, summary_table, text_key};
use crate::quantize::{MedianCut, Quantizer, MAX_COLORS};
use crate::reducer::{default_max_levels, reduce, Reduction, ReductionStatus};
use crate::remap::{display_grid, remap};
use crate::render::{downscale, min_label_factor, render_chart, render_template, ChartStyle};

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    /// Distinct threads wanted in the pattern, 1..=256 (default: 6)
    pub colors: usize,
    /// Stitch grid width in cells, 1..=1000 (default: 100)
    pub target_width: u32,
    /// Chart pixels per cell, 8..=64 (default: 13); 3-digit numbers need 12
    pub upscale_factor: u32,
    /// Thick grid line every N cells, 1..=1000 (default: 10)
    pub major_grid_every: u32,
    /// Ceiling for the palette search, 1..=256 (default: catalog size, capped at 256)
    pub max_quantization_levels: Option<usize>,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            colors: 6,
            target_width: 100,
            upscale_factor: 13,
            major_grid_every: 10,
            max_quantization_levels: None,
        }
    }
}

impl PatternSettings {
    /// Read settings from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: PatternSettings = serde_json::from_str(&text)?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        check_range("colors", self.colors, 1, MAX_COLORS)?;
        check_range("target_width", self.target_width as usize, 1, 1000)?;
        check_range("upscale_factor", self.upscale_factor as usize, min_label_factor(0) as usize, 64)?;
        check_range("major_grid_every", self.major_grid_every as usize, 1, 1000)?;
        if let Some(levels) = self.max_quantization_levels {
            check_range("max_quantization_levels", levels, 1, MAX_COLORS)?;
        }
        // display indices run 0..colors
        let needed = min_label_factor(self.colors - 1);
        if self.upscale_factor < needed {
            return Err(PatternError::InvalidParameter(format!(
                "upscale_factor {} is too small to number {} colors, need at least {}",
                self.upscale_factor, self.colors, needed
            )));
        }
        Ok(())
    }

    /// Search ceiling for `catalog`
    pub fn ceiling(&self, catalog: &Catalog) -> usize {
        self.max_quantization_levels
            .unwrap_or_else(|| default_max_levels(catalog.len()))
    }

    pub fn chart_style(&self) -> ChartStyle {
        ChartStyle {
            upscale_factor: self.upscale_factor,
            major_every: self.major_grid_every,
            ..ChartStyle::default()
        }
    }
}

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(PatternError::InvalidParameter(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

// ============================================================================
// IN-MEMORY PIPELINE
// ============================================================================

/// Everything a run produces, before anything touches disk.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub original_size: (u32, u32),
    /// Source resized to the stitch grid
    pub downscaled: RgbImage,
    pub reduction: Reduction,
    /// One pixel per cell, thread colors
    pub stitches: RgbImage,
    pub chart: RgbImage,
    pub template: RgbImage,
}

impl Pattern {
    /// Fail with `UnreachableTargetCount` unless the color search converged.
    pub fn into_converged(self) -> Result<Self> {
        let reduction = self.reduction.into_converged()?;
        Ok(Self { reduction, ..self })
    }
}

/// Build the pattern with the built-in median-cut quantizer.
pub fn generate(source: &RgbImage, settings: &PatternSettings, catalog: &Catalog) -> Result<Pattern> {
    generate_with(source, settings, catalog, &MedianCut)
}

pub fn generate_with<Q: Quantizer + ?Sized>(
    source: &RgbImage,
    settings: &PatternSettings,
    catalog: &Catalog,
    quantizer: &Q,
) -> Result<Pattern> {
    settings.validate()?;
    let original_size = source.dimensions();
    if original_size.0 == 0 || original_size.1 == 0 {
        return Err(PatternError::InvalidParameter("source image is empty".to_string()));
    }

    let downscaled = downscale(source, settings.target_width);
    info!(
        from = ?original_size,
        to = ?downscaled.dimensions(),
        "downscaled source"
    );

    let ceiling = settings.ceiling(catalog);
    let reduction = reduce(&downscaled, settings.colors, ceiling, catalog, quantizer)?;
    info!(
        level = reduction.level,
        iterations = reduction.iterations,
        threads = reduction.palette.len(),
        "palette reduced"
    );

    let stitches = remap(&reduction.quantized, &reduction.palette)?;
    let labels = display_grid(&reduction.quantized, &reduction.palette)?;

    let style = settings.chart_style();
    let (w, h) = stitches.dimensions();
    let chart = render_chart(&stitches, &labels, &style)?;
    let template = render_template(w, h, &labels, &style)?;

    Ok(Pattern {
        original_size,
        downscaled,
        reduction,
        stitches,
        chart,
        template,
    })
}

// ============================================================================
// FILE PIPELINE
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OutputPaths {
    pub downscaled: PathBuf,
    pub pattern: PathBuf,
    pub chart: PathBuf,
    pub template: PathBuf,
    pub key: PathBuf,
    pub key_json: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            downscaled: dir.join("downscaled.png"),
            pattern: dir.join("pattern.png"),
            chart: dir.join("cross-stitch.png"),
            template: dir.join("template.png"),
            key: dir.join("key.txt"),
            key_json: dir.join("key.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternReport {
    pub original_size: (u32, u32),
    pub grid_size: (u32, u32),
    pub colors_requested: usize,
    pub colors_used: usize,
    pub level: usize,
    pub iterations: usize,
    pub status: ReductionStatus,
    pub outputs: OutputPaths,
}

/// Load `input`, build the pattern, and write every artifact into `output_dir`.
pub fn run(
    input: &Path,
    output_dir: &Path,
    settings: &PatternSettings,
    catalog: &Catalog,
) -> Result<(PatternReport, Pattern)> {
    info!(input = %input.display(), "loading source image");
    let source = load_image(input)?;
    let pattern = generate(&source, settings, catalog)?;
    let report = write_outputs(&pattern, settings, output_dir)?;
    Ok((report, pattern))
}

/// Write every artifact of `pattern` into `output_dir`, creating it if needed.
pub fn write_outputs(pattern: &Pattern, settings: &PatternSettings, output_dir: &Path) -> Result<PatternReport> {
    std::fs::create_dir_all(output_dir)?;
    let outputs = OutputPaths::in_dir(output_dir);

    save_image(&pattern.reduction.quantized.to_rgb_image(), &outputs.downscaled)?;
    save_image(&pattern.stitches, &outputs.pattern)?;
    save_image(&pattern.chart, &outputs.chart)?;
    save_image(&pattern.template, &outputs.template)?;
    std::fs::write(&outputs.key, text_key(&pattern.reduction.palette))?;
    std::fs::write(&outputs.key_json, json_key(&pattern.reduction.palette)?)?;
    info!(dir = %output_dir.display(), "pattern written");

    Ok(PatternReport {
        original_size: pattern.original_size,
        grid_size: pattern.stitches.dimensions(),
        colors_requested: settings.colors,
        colors_used: pattern.reduction.palette.len(),
        level: pattern.reduction.level,
        iterations: pattern.reduction.iterations,
        status: pattern.reduction.status.clone(),
        outputs,
    })
}

/// Console table for the finished pattern
pub fn summary(pattern: &Pattern) -> String {
    summary_table(&pattern.reduction.palette)
}

/// Load an image from disk as RGB (alpha is discarded)
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let img = image::open(path)
        .map_err(|e| PatternError::Processing(format!("Failed to load {}: {}", path.display(), e)))?;
    Ok(img.to_rgb8())
}

/// Save an in-memory image to disk
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    // Ensure output directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    img.save(path)?;
    Ok(())
}
