//! Rock-sample localization.
//!
//! Two detectors feed one judgement:
//!
//! - **Map detection** looks at rock pixels of the rectified top-down frame
//!   near the rover. The top-down view sees further, so it decides whether a
//!   sample is worth stopping for.
//! - **Camera alignment** looks at rock pixels of the raw forward frame and
//!   reports where their centroid sits relative to the image centre. It is
//!   the tighter signal used to line up the final approach.
//!
//! Both detectors report "nothing seen" as an explicit value
//! ([`None`] / [`CameraAlignment::NotVisible`]) rather than an undefined
//! mean.

use serde::{Deserialize, Serialize};

use crate::classify::Mask;

/// Rock-localization tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RockConfig {
    /// Only top-down rock pixels within this pixel radius of the rover count.
    pub map_radius: f32,
    /// Smallest accepted mean column offset of those pixels. The camera sees
    /// further to one side than the other, so the gate is asymmetric.
    pub min_col_offset: f32,
    /// Half-width, in pixels, of the band around the image centre in which
    /// the camera centroid counts as aligned.
    pub alignment_tolerance_px: f32,
}

impl Default for RockConfig {
    fn default() -> Self {
        Self {
            map_radius: 28.0,
            min_col_offset: -5.0,
            alignment_tolerance_px: 2.0,
        }
    }
}

/// Result of the top-down detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapRockFix {
    /// Mean row offset from the rover origin; negative is ahead.
    pub mean_row_offset: f32,
    /// Mean column offset from the rover origin.
    pub mean_col_offset: f32,
    /// Rock pixels inside the radius.
    pub pixels: usize,
    /// The sample sits inside the forward gate.
    pub ahead: bool,
}

/// Result of the forward-camera detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraAlignment {
    /// No rock pixel in the forward frame.
    NotVisible,
    Visible {
        /// Mean column of the rock pixels.
        centroid_col: f32,
        /// `centroid_col` minus the image centre; negative means the rock is
        /// left of centre.
        offset_px: f32,
        aligned: bool,
    },
}

impl CameraAlignment {
    pub fn is_visible(&self) -> bool {
        matches!(self, CameraAlignment::Visible { .. })
    }

    pub fn is_aligned(&self) -> bool {
        matches!(self, CameraAlignment::Visible { aligned: true, .. })
    }
}

/// Fused rock judgement for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RockObservation {
    pub map: Option<MapRockFix>,
    pub camera: CameraAlignment,
    /// A sample is close ahead and no pickup is running.
    pub nearby: bool,
}

impl RockObservation {
    /// Nothing seen by either detector.
    pub fn none() -> Self {
        Self {
            map: None,
            camera: CameraAlignment::NotVisible,
            nearby: false,
        }
    }
}

/// Runs both detectors.
#[derive(Debug, Clone, Copy)]
pub struct RockLocator {
    config: RockConfig,
}

impl RockLocator {
    pub fn new(config: RockConfig) -> Self {
        Self { config }
    }

    /// Look for rock pixels near the rover origin (bottom-centre) of the
    /// top-down rock mask. `None` when none fall inside the radius.
    pub fn locate_in_map(&self, rock: &Mask) -> Option<MapRockFix> {
        let origin_row = rock.height() as f32 - 1.0;
        let origin_col = rock.width() as f32 / 2.0 - 0.5;

        let (mut sum_row, mut sum_col, mut n) = (0.0f32, 0.0f32, 0usize);
        for (row, col) in rock.iter_set() {
            let dr = row as f32 - origin_row;
            let dc = col as f32 - origin_col;
            if dr.hypot(dc) <= self.config.map_radius {
                sum_row += dr;
                sum_col += dc;
                n += 1;
            }
        }
        if n == 0 {
            return None;
        }

        let mean_row_offset = sum_row / n as f32;
        let mean_col_offset = sum_col / n as f32;
        Some(MapRockFix {
            mean_row_offset,
            mean_col_offset,
            pixels: n,
            ahead: mean_row_offset < 0.0 && mean_col_offset >= self.config.min_col_offset,
        })
    }

    /// Centroid of the rock pixels of the raw forward frame.
    pub fn align_camera(&self, rock: &Mask) -> CameraAlignment {
        let (mut sum, mut n) = (0.0f64, 0usize);
        for (_, col) in rock.iter_set() {
            sum += col as f64;
            n += 1;
        }
        if n == 0 {
            return CameraAlignment::NotVisible;
        }

        let centroid_col = (sum / n as f64) as f32;
        let centre = rock.width() as f32 / 2.0 - 0.5;
        let offset_px = centroid_col - centre;
        CameraAlignment::Visible {
            centroid_col,
            offset_px,
            aligned: offset_px.abs() <= self.config.alignment_tolerance_px,
        }
    }

    /// Run both detectors. A running pickup suppresses `nearby` so the rover
    /// does not try to approach the sample it is already lifting.
    pub fn observe(&self, top_down_rock: &Mask, camera_rock: &Mask, picking_up: bool) -> RockObservation {
        let map = self.locate_in_map(top_down_rock);
        let camera = self.align_camera(camera_rock);
        let nearby = !picking_up && map.is_some_and(|fix| fix.ahead);
        RockObservation {
            map,
            camera,
            nearby,
        }
    }
}
