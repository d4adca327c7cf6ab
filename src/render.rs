//! Chart Rendering
//!
//! Builds the two printable rasters from the stitch grid:
//! - cross-stitch chart: thread colors, numbered cells, grid lines
//! - template: same numbers and lines on white
//!
//! Cell numbers use a built-in 3x5 digit font so no font files are needed.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::error::{Result, PatternError};

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartStyle {
    /// Pixels per stitch cell (default: 13)
    pub upscale_factor: u32,
    /// Thick line after every N cells (default: 10)
    pub major_every: u32,
    pub line_color: (u8, u8, u8),
    pub label_color: (u8, u8, u8),
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            upscale_factor: 13,
            major_every: 10,
            line_color: (0, 0, 0),
            label_color: (0, 0, 0),
        }
    }
}

// ============================================================================
// RESAMPLING
// ============================================================================

/// Bilinear downscale to `width`, keeping the aspect ratio.
pub fn downscale(img: &RgbImage, width: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || width == 0 {
        return RgbImage::new(0, 0);
    }
    let height = ((width as f64 / w as f64) * h as f64) as u32;
    imageops::resize(img, width, height.max(1), FilterType::Triangle)
}

/// Nearest-neighbour integer upscale
pub fn upscale(img: &RgbImage, factor: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    imageops::resize(img, w * factor, h * factor, FilterType::Nearest)
}

// ============================================================================
// CHART + TEMPLATE
// ============================================================================

/// Upscaled thread-color chart with numbered cells and grid lines.
pub fn render_chart(stitches: &RgbImage, labels: &[usize], style: &ChartStyle) -> Result<RgbImage> {
    check_style(style)?;
    let (w, h) = stitches.dimensions();
    check_labels(labels, w, h)?;

    let mut chart = upscale(stitches, style.upscale_factor);
    draw_grid(&mut chart, style);
    draw_labels(&mut chart, labels, w, style);
    Ok(chart)
}

/// White sheet with the same numbers and grid as the chart.
pub fn render_template(width: u32, height: u32, labels: &[usize], style: &ChartStyle) -> Result<RgbImage> {
    check_style(style)?;
    check_labels(labels, width, height)?;

    let f = style.upscale_factor;
    let mut template = RgbImage::from_pixel(width * f, height * f, Rgb([255, 255, 255]));
    draw_grid(&mut template, style);
    draw_labels(&mut template, labels, width, style);
    Ok(template)
}

fn check_style(style: &ChartStyle) -> Result<()> {
    if style.upscale_factor == 0 {
        return Err(PatternError::InvalidParameter("upscale factor must be at least 1".to_string()));
    }
    if style.major_every == 0 {
        return Err(PatternError::InvalidParameter("major grid spacing must be at least 1".to_string()));
    }
    Ok(())
}

fn check_labels(labels: &[usize], width: u32, height: u32) -> Result<()> {
    let expected = width as usize * height as usize;
    if labels.len() != expected {
        return Err(PatternError::Processing(format!(
            "{} labels for a {}x{} grid",
            labels.len(),
            width,
            height
        )));
    }
    Ok(())
}

/// Thin 2px lines on every cell boundary, 4px lines every `major_every` cells.
fn draw_grid(img: &mut RgbImage, style: &ChartStyle) {
    let (width, height) = img.dimensions();
    let f = style.upscale_factor;
    let (r, g, b) = style.line_color;
    let color = Rgb([r, g, b]);

    let mut x = f - 1;
    while x < width {
        fill(img, x as i32, 0, 2, height, color);
        x += f;
    }
    let mut y = f - 1;
    while y < height {
        fill(img, 0, y as i32, width, 2, color);
        y += f;
    }

    let major = f * style.major_every;
    let mut x = major - 1;
    while x < width {
        fill(img, x as i32 - 1, 0, 4, height, color);
        x += major;
    }
    let mut y = major - 1;
    while y < height {
        fill(img, 0, y as i32 - 1, width, 4, color);
        y += major;
    }
}

/// Smallest upscale factor whose cells fit every label up to `max_label`.
pub fn min_label_factor(max_label: usize) -> u32 {
    let len = digits_of(max_label).len() as u32;
    let (w, h) = text_size(len, 1, 0);
    w.max(h) + CELL_MARGIN
}

/// Center each cell's number inside the cell, skipping cells too small for it.
fn draw_labels(img: &mut RgbImage, labels: &[usize], grid_width: u32, style: &ChartStyle) {
    if grid_width == 0 {
        return;
    }
    let f = style.upscale_factor;
    let inner = f.saturating_sub(CELL_MARGIN);
    let (r, g, b) = style.label_color;
    let color = Rgb([r, g, b]);

    let mut skipped = 0usize;
    for (i, &label) in labels.iter().enumerate() {
        let digits = digits_of(label);
        let Some((scale, gap)) = fit_label(digits.len() as u32, inner) else {
            skipped += 1;
            continue;
        };
        let (text_w, text_h) = text_size(digits.len() as u32, scale, gap);

        let cx = (i as u32 % grid_width) * f;
        let cy = (i as u32 / grid_width) * f;
        let x = cx + 1 + (inner - text_w) / 2;
        let y = cy + 1 + (inner - text_h) / 2;
        draw_digits(img, &digits, x, y, scale, gap, color);
    }
    if skipped > 0 {
        warn!(skipped, upscale_factor = f, "cells too small for their numbers");
    }
}

/// Largest scale that fits `len` digits in `inner` pixels; tightens the
/// glyph gap before giving up.
fn fit_label(len: u32, inner: u32) -> Option<(u32, u32)> {
    [GLYPH_GAP, 0].into_iter().find_map(|gap| {
        let (w, h) = text_size(len, 1, gap);
        let scale = (inner / w).min(inner / h);
        (scale > 0).then_some((scale, gap))
    })
}

fn fill(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    if w == 0 || h == 0 {
        return;
    }
    draw_filled_rect_mut(img, Rect::at(x, y).of_size(w, h), color);
}

// ============================================================================
// DIGIT FONT
// ============================================================================

const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;
const GLYPH_GAP: u32 = 1;
/// Line pixels lost inside each cell
const CELL_MARGIN: u32 = 3;

/// Rows top to bottom, bit 2 = leftmost column.
const GLYPHS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

fn digits_of(n: usize) -> Vec<u8> {
    n.to_string().bytes().map(|b| b - b'0').collect()
}

fn text_size(len: u32, scale: u32, gap: u32) -> (u32, u32) {
    let w = len * GLYPH_W + len.saturating_sub(1) * gap;
    (w * scale, GLYPH_H * scale)
}

fn draw_digits(img: &mut RgbImage, digits: &[u8], x: u32, y: u32, scale: u32, gap: u32, color: Rgb<u8>) {
    for (i, &d) in digits.iter().enumerate() {
        let gx = x + i as u32 * (GLYPH_W + gap) * scale;
        for (row, bits) in GLYPHS[d as usize].iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) != 0 {
                    fill(
                        img,
                        (gx + col * scale) as i32,
                        (y + row as u32 * scale) as i32,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: [u8; 3] = [0, 0, 0];
    const WHITE: [u8; 3] = [255, 255, 255];

    #[test]
    fn test_downscale_keeps_aspect() {
        let img = RgbImage::from_pixel(400, 300, Rgb([10, 20, 30]));
        let small = downscale(&img, 100);
        assert_eq!(small.dimensions(), (100, 75));
        assert_eq!(small.get_pixel(50, 40).0, [10, 20, 30]);
    }

    #[test]
    fn test_downscale_never_zero_height() {
        let img = RgbImage::from_pixel(1000, 2, Rgb([0, 0, 0]));
        assert_eq!(downscale(&img, 10).dimensions(), (10, 1));
    }

    #[test]
    fn test_upscale_nearest() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([1, 1, 1]) } else { Rgb([2, 2, 2]) });
        let big = upscale(&img, 4);
        assert_eq!(big.dimensions(), (8, 4));
        assert_eq!(big.get_pixel(3, 3).0, [1, 1, 1]);
        assert_eq!(big.get_pixel(4, 0).0, [2, 2, 2]);
    }

    #[test]
    fn test_template_grid_lines() {
        let style = ChartStyle::default();
        let template = render_template(12, 2, &vec![0; 24], &style).unwrap();
        assert_eq!(template.dimensions(), (156, 26));

        // thin line at the end of the first cell
        assert_eq!(template.get_pixel(12, 5).0, BLACK);
        assert_eq!(template.get_pixel(13, 5).0, BLACK);
        // thick line around x = 129
        for x in 128..=131 {
            assert_eq!(template.get_pixel(x, 5).0, BLACK, "x = {}", x);
        }
        // cell corner interior stays white
        assert_eq!(template.get_pixel(2, 1).0, WHITE);
    }

    #[test]
    fn test_chart_keeps_cell_colors() {
        let stitches = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([255, 0, 0]) } else { Rgb([0, 255, 0]) });
        let chart = render_chart(&stitches, &[0, 1], &ChartStyle::default()).unwrap();
        assert_eq!(chart.dimensions(), (26, 13));
        assert_eq!(chart.get_pixel(1, 1).0, [255, 0, 0]);
        assert_eq!(chart.get_pixel(15, 1).0, [0, 255, 0]);
        // some label pixels are drawn inside the first cell
        let inked = (1..11).flat_map(|x| (1..11).map(move |y| (x, y)))
            .filter(|&(x, y)| chart.get_pixel(x, y).0 == BLACK)
            .count();
        assert!(inked > 0);
    }

    #[test]
    fn test_label_count_mismatch() {
        let stitches = RgbImage::new(2, 2);
        assert!(render_chart(&stitches, &[0, 1, 2], &ChartStyle::default()).is_err());
    }

    #[test]
    fn test_tiny_cells_skip_labels() {
        let style = ChartStyle {
            upscale_factor: 4,
            ..ChartStyle::default()
        };
        let template = render_template(1, 1, &[123], &style).unwrap();
        assert_eq!(template.get_pixel(1, 1).0, WHITE);
    }

    #[test]
    fn test_zero_factor_rejected() {
        let style = ChartStyle {
            upscale_factor: 0,
            ..ChartStyle::default()
        };
        assert!(render_template(1, 1, &[0], &style).is_err());
    }

    #[test]
    fn test_text_size() {
        assert_eq!(text_size(1, 1, GLYPH_GAP), (3, 5));
        assert_eq!(text_size(3, 2, GLYPH_GAP), (22, 10));
        assert_eq!(text_size(3, 1, 0), (9, 5));
        assert_eq!(digits_of(207), vec![2, 0, 7]);
    }

    fn black_pixels(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p.0 == BLACK).count()
    }

    fn grid_only(width: u32, height: u32, style: &ChartStyle) -> usize {
        let blank = ChartStyle {
            label_color: (255, 255, 255),
            ..style.clone()
        };
        let labels = vec![0; (width * height) as usize];
        black_pixels(&render_template(width, height, &labels, &blank).unwrap())
    }

    #[test]
    fn test_min_label_factor() {
        assert_eq!(min_label_factor(0), 8);
        assert_eq!(min_label_factor(9), 8);
        assert_eq!(min_label_factor(42), 9);
        assert_eq!(min_label_factor(255), 12);
    }

    #[test]
    fn test_single_digit_at_minimum_factor() {
        let style = ChartStyle {
            upscale_factor: min_label_factor(9),
            ..ChartStyle::default()
        };
        let template = render_template(1, 1, &[3], &style).unwrap();
        assert!(black_pixels(&template) > grid_only(1, 1, &style));
        // top bar of the 3
        for x in 2..=4 {
            assert_eq!(template.get_pixel(x, 1).0, BLACK, "x = {}", x);
        }
    }

    #[test]
    fn test_three_digit_label_at_default_style() {
        let style = ChartStyle::default();
        let template = render_template(1, 1, &[150], &style).unwrap();
        assert!(black_pixels(&template) > grid_only(1, 1, &style));
        // 1 at x 1..=3, 5 at x 4..=6, 0 at x 7..=9, glyphs start at y 3
        assert_eq!(template.get_pixel(2, 3).0, BLACK);
        assert_eq!(template.get_pixel(5, 3).0, BLACK);
        assert_eq!(template.get_pixel(8, 3).0, BLACK);
        assert_eq!(template.get_pixel(8, 5).0, WHITE);
    }
}
