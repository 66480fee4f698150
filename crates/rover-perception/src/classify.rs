//! Per-pixel terrain classification.
//!
//! A rectified top-down frame is split into three independent binary
//! [`Mask`]s:
//!
//! | Mask        | Rule                                                          |
//! |-------------|---------------------------------------------------------------|
//! | navigable   | every RGB channel above its brightness threshold             |
//! | obstacle    | some channel at or below its threshold, pixel not true-black |
//! | rock        | HSV inside the yellow sample band                             |
//!
//! True-black pixels are the unrectified border left by the perspective
//! warp and belong to none of the masks. No smoothing is applied; isolated
//! misclassified pixels are left for the aggregating stages to absorb.

use std::ops::Range;

use rover_types::Frame;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Mask
// ────────────────────────────────────────────────────────────────────────────

/// A row-major boolean image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Mask {
    /// An all-clear mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    /// Build a mask by evaluating `f(row, col)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut bits = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                bits.push(f(row, col));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.bits[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        self.bits[row * self.width + col] = value;
    }

    /// Set every pixel of a rectangle; the ranges are clipped to the mask.
    pub fn fill_rect(&mut self, rows: Range<usize>, cols: Range<usize>) {
        for row in rows.start..rows.end.min(self.height) {
            for col in cols.start..cols.end.min(self.width) {
                self.set(row, col, true);
            }
        }
    }

    /// Number of set pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Number of set pixels inside a rectangle (clipped to the mask).
    pub fn count_in(&self, rows: Range<usize>, cols: Range<usize>) -> usize {
        let col_end = cols.end.min(self.width);
        let mut n = 0;
        for row in rows.start..rows.end.min(self.height) {
            let base = row * self.width;
            for col in cols.start..col_end {
                if self.bits[base + col] {
                    n += 1;
                }
            }
        }
        n
    }

    /// `(row, col)` of every set pixel, in row-major order.
    pub fn iter_set(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let width = self.width;
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(move |(i, _)| (i / width, i % width))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Thresholds
// ────────────────────────────────────────────────────────────────────────────

/// Colour thresholds used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorThresholds {
    /// Per-channel RGB brightness cut-off for navigable terrain.
    pub navigable_rgb: [u8; 3],
    /// Inclusive lower HSV bound of the rock-sample band (H on a 0–179 scale).
    pub rock_hsv_lower: [u8; 3],
    /// Inclusive upper HSV bound of the rock-sample band.
    pub rock_hsv_upper: [u8; 3],
}

impl Default for ColorThresholds {
    fn default() -> Self {
        Self {
            navigable_rgb: [160, 160, 160],
            rock_hsv_lower: [22, 150, 150],
            rock_hsv_upper: [28, 255, 255],
        }
    }
}

impl ColorThresholds {
    /// `true` when every lower HSV bound is at or below its upper bound.
    pub fn rock_band_is_ordered(&self) -> bool {
        self.rock_hsv_lower
            .iter()
            .zip(self.rock_hsv_upper.iter())
            .all(|(lo, hi)| lo <= hi)
    }
}

/// Convert an RGB pixel to 8-bit HSV: hue in `0..=179` (degrees halved),
/// saturation and value in `0..=255`.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    let mut h8 = (h / 2.0).round() as u16;
    if h8 >= 180 {
        h8 -= 180;
    }

    [h8 as u8, s.round() as u8, v as u8]
}

// ────────────────────────────────────────────────────────────────────────────
// Mask builders
// ────────────────────────────────────────────────────────────────────────────

fn frame_mask(frame: &Frame, f: impl Fn([u8; 3]) -> bool) -> Mask {
    Mask::from_fn(frame.cols(), frame.rows(), |row, col| f(frame.pixel(row, col)))
}

/// Bright, flat terrain: every channel strictly above `threshold`.
pub fn navigable_mask(frame: &Frame, threshold: [u8; 3]) -> Mask {
    frame_mask(frame, |p| p.iter().zip(threshold).all(|(c, t)| *c > t))
}

/// Anything dark enough to not be ground, excluding true-black pixels.
pub fn obstacle_mask(frame: &Frame, threshold: [u8; 3]) -> Mask {
    frame_mask(frame, |p| {
        let below = p.iter().zip(threshold).any(|(c, t)| *c <= t);
        let lit = p.iter().any(|c| *c > 0);
        below && lit
    })
}

/// Saturated yellow rock samples.
pub fn rock_mask(frame: &Frame, lower: [u8; 3], upper: [u8; 3]) -> Mask {
    frame_mask(frame, |p| {
        let hsv = rgb_to_hsv(p);
        (0..3).all(|i| hsv[i] >= lower[i] && hsv[i] <= upper[i])
    })
}

// ────────────────────────────────────────────────────────────────────────────
// ClassifiedFrame
// ────────────────────────────────────────────────────────────────────────────

/// The three classification masks of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFrame {
    pub navigable: Mask,
    pub obstacle: Mask,
    pub rock: Mask,
}

impl ClassifiedFrame {
    /// Classify every pixel of `frame`.
    pub fn classify(frame: &Frame, thresholds: &ColorThresholds) -> Self {
        Self {
            navigable: navigable_mask(frame, thresholds.navigable_rgb),
            obstacle: obstacle_mask(frame, thresholds.navigable_rgb),
            rock: rock_mask(frame, thresholds.rock_hsv_lower, thresholds.rock_hsv_upper),
        }
    }

    /// A frame where nothing was recognised.
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            navigable: Mask::new(width, height),
            obstacle: Mask::new(width, height),
            rock: Mask::new(width, height),
        }
    }

    pub fn width(&self) -> usize {
        self.navigable.width()
    }

    pub fn height(&self) -> usize {
        self.navigable.height()
    }

    /// Render the display overlay: red = obstacle, green = rock,
    /// blue = navigable.
    pub fn to_overlay(&self) -> Frame {
        let mut frame = Frame::black(self.width() as u32, self.height() as u32);
        for row in 0..self.height() {
            for col in 0..self.width() {
                let on = |m: &Mask| if m.get(row, col) { 255 } else { 0 };
                frame.set_pixel(
                    row,
                    col,
                    [on(&self.obstacle), on(&self.rock), on(&self.navigable)],
                );
            }
        }
        frame
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
