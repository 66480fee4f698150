//! Per-tick perception pipeline.
//!
//! ```text
//! camera frame ─► rectify ─► classify ─┬─► rover coords ─► world cells ─► WorldMap (near-level only)
//!                                      ├─► navigable polar bearings ─► means
//!                                      └─► rock (top-down) ─┐
//! camera frame ─► classify rock ───────────────────────────┴─► RockObservation
//! ```
//!
//! The output is a [`PerceptionSummary`], rebuilt from scratch every tick and
//! handed by value to the decision engine.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::pipeline::{PerceptionConfig, PerceptionPipeline};
//! use rover_types::{Frame, Telemetry};
//!
//! let pipeline = PerceptionPipeline::new(PerceptionConfig::default(), 320, 160).unwrap();
//! let mut map = pipeline.new_world_map();
//!
//! // Navigable ground fills the bottom half of the camera image.
//! let mut frame = Frame::black(320, 160);
//! frame.fill_rect(80..160, 0..320, [200, 200, 200]);
//!
//! let summary = pipeline
//!     .process(&frame, &Telemetry::at_rest(100.0, 100.0, 0.0), &mut map)
//!     .unwrap();
//! assert!(summary.has_bearings());
//! assert!(summary.map_updated);
//! ```

use rover_types::{Frame, RoverError, Telemetry};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{ClassifiedFrame, ColorThresholds, rock_mask};
use crate::rectify::{Calibration, Rectifier};
use crate::rock::{RockConfig, RockLocator, RockObservation};
use crate::transform::{pixel_to_rover_frame, rotate_and_translate, to_polar};
use crate::world_map::{MAX_WORLD_SIZE, MapChannel, WorldGeometry, WorldMap, is_near_level};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Static perception settings for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Roll and pitch must both be within this many degrees of level for the
    /// world map to be updated.
    pub level_tolerance_deg: f32,
    /// Radius (rover pixels) of the near field used for `local_mean_angle`.
    pub near_field_radius: f32,
    pub calibration: Calibration,
    pub colors: ColorThresholds,
    pub world: WorldGeometry,
    pub rock: RockConfig,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            calibration: Calibration::default(),
            colors: ColorThresholds::default(),
            world: WorldGeometry::default(),
            rock: RockConfig::default(),
            level_tolerance_deg: 0.5,
            near_field_radius: 20.0,
        }
    }
}

impl PerceptionConfig {
    /// Check the settings that cannot be caught by the type system.
    ///
    /// The calibration itself is checked when the [`Rectifier`] is built.
    pub fn validate(&self) -> Result<(), RoverError> {
        let fail = |msg: String| Err(RoverError::InvalidConfig(msg));
        if !(1..=MAX_WORLD_SIZE).contains(&self.world.size) {
            return fail(format!(
                "world.size must be in 1..={MAX_WORLD_SIZE}, got {}",
                self.world.size
            ));
        }
        if !(self.world.scale > 0.0) {
            return fail(format!("world.scale must be positive, got {}", self.world.scale));
        }
        if !(self.near_field_radius > 0.0) {
            return fail(format!(
                "near_field_radius must be positive, got {}",
                self.near_field_radius
            ));
        }
        if !(self.level_tolerance_deg > 0.0 && self.level_tolerance_deg < 180.0) {
            return fail(format!(
                "level_tolerance_deg must be in (0, 180), got {}",
                self.level_tolerance_deg
            ));
        }
        if !self.colors.rock_band_is_ordered() {
            return fail("rock HSV lower bound exceeds upper bound".to_string());
        }
        if !(self.rock.map_radius > 0.0) {
            return fail(format!("rock.map_radius must be positive, got {}", self.rock.map_radius));
        }
        if !(self.rock.alignment_tolerance_px > 0.0) {
            return fail(format!(
                "rock.alignment_tolerance_px must be positive, got {}",
                self.rock.alignment_tolerance_px
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Summary
// ────────────────────────────────────────────────────────────────────────────

/// What the decision engine gets to see of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptionSummary {
    /// Distances of every navigable pixel, rover frame.
    pub nav_distances: Vec<f32>,
    /// Angles (radians, left-positive) of every navigable pixel, same order.
    pub nav_angles: Vec<f32>,
    /// `None` when there is no navigable pixel.
    pub mean_distance: Option<f32>,
    /// `None` when there is no navigable pixel.
    pub mean_angle: Option<f32>,
    /// Mean angle over the near field only; `None` when the near field holds
    /// no navigable pixel.
    pub local_mean_angle: Option<f32>,
    /// Classification of the rectified frame, used by the window checks.
    pub classified: ClassifiedFrame,
    pub rock: RockObservation,
    /// The world map was updated this tick.
    pub map_updated: bool,
}

impl PerceptionSummary {
    /// Derive the navigation bearings from an already classified frame.
    pub fn from_classified(
        classified: ClassifiedFrame,
        rock: RockObservation,
        near_field_radius: f32,
    ) -> Self {
        let (height, width) = (classified.height(), classified.width());
        let n = classified.navigable.count();
        let mut nav_distances = Vec::with_capacity(n);
        let mut nav_angles = Vec::with_capacity(n);
        let mut near_angles = Vec::new();
        for (row, col) in classified.navigable.iter_set() {
            let (x, y) = pixel_to_rover_frame(row, col, height, width);
            let (dist, angle) = to_polar(x, y);
            if dist < near_field_radius {
                near_angles.push(angle);
            }
            nav_distances.push(dist);
            nav_angles.push(angle);
        }

        Self {
            mean_distance: mean(&nav_distances),
            mean_angle: mean(&nav_angles),
            local_mean_angle: mean(&near_angles),
            nav_distances,
            nav_angles,
            classified,
            rock,
            map_updated: false,
        }
    }

    /// A tick where nothing at all was recognised.
    pub fn blind(width: usize, height: usize) -> Self {
        Self::from_classified(ClassifiedFrame::empty(width, height), RockObservation::none(), 1.0)
    }

    /// `true` when there is at least one navigable bearing.
    pub fn has_bearings(&self) -> bool {
        !self.nav_angles.is_empty()
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().map(|v| f64::from(*v)).sum();
    Some((sum / values.len() as f64) as f32)
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Rectify → classify → map → summarise, for frames of one fixed geometry.
#[derive(Debug, Clone)]
pub struct PerceptionPipeline {
    config: PerceptionConfig,
    rectifier: Rectifier,
    locator: RockLocator,
    width: u32,
    height: u32,
}

impl PerceptionPipeline {
    /// Build a pipeline for `width` × `height` camera frames.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidConfig`] when the configuration fails
    /// validation or the calibration is degenerate.
    pub fn new(config: PerceptionConfig, width: u32, height: u32) -> Result<Self, RoverError> {
        if width == 0 || height == 0 {
            return Err(RoverError::InvalidConfig(format!(
                "frame geometry {width}x{height} is empty"
            )));
        }
        config.validate()?;
        let rectifier = Rectifier::new(&config.calibration, width, height)?;
        Ok(Self {
            rectifier,
            locator: RockLocator::new(config.rock),
            config,
            width,
            height,
        })
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    /// A fresh world map sized for this pipeline.
    pub fn new_world_map(&self) -> WorldMap {
        WorldMap::new(self.config.world.size)
    }

    /// Run one tick of perception.
    ///
    /// Everything that can fail is checked before `map` is touched, so an
    /// `Err` leaves the map exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`RoverError::FrameSize`] / [`RoverError::FrameData`] for a frame of
    ///   the wrong geometry.
    /// - [`RoverError::InvalidTelemetry`] for a non-finite telemetry field.
    /// - [`RoverError::InvalidConfig`] when `map` was not sized for this
    ///   pipeline.
    pub fn process(
        &self,
        frame: &Frame,
        telemetry: &Telemetry,
        map: &mut WorldMap,
    ) -> Result<PerceptionSummary, RoverError> {
        telemetry.validate()?;
        if map.size() != self.config.world.size {
            return Err(RoverError::InvalidConfig(format!(
                "world map is {0}x{0}, pipeline expects {1}x{1}",
                map.size(),
                self.config.world.size
            )));
        }
        let top_down = self.rectifier.rectify(frame)?;

        let classified = ClassifiedFrame::classify(&top_down, &self.config.colors);
        let camera_rock = rock_mask(
            frame,
            self.config.colors.rock_hsv_lower,
            self.config.colors.rock_hsv_upper,
        );
        let rock = self
            .locator
            .observe(&classified.rock, &camera_rock, telemetry.picking_up);

        let pose = &telemetry.pose;
        let map_updated = is_near_level(pose.roll_deg, pose.pitch_deg, self.config.level_tolerance_deg);
        if map_updated {
            for (channel, mask) in [
                (MapChannel::Obstacle, &classified.obstacle),
                (MapChannel::Rock, &classified.rock),
                (MapChannel::Navigable, &classified.navigable),
            ] {
                let cells = mask.iter_set().map(|(row, col)| {
                    let (x, y) = pixel_to_rover_frame(row, col, self.height as usize, self.width as usize);
                    rotate_and_translate(
                        x,
                        y,
                        pose.yaw_deg,
                        pose.x,
                        pose.y,
                        self.config.world.scale,
                        self.config.world.size,
                    )
                });
                map.mark_cells(channel, cells);
            }
        } else {
            debug!(
                roll = pose.roll_deg,
                pitch = pose.pitch_deg,
                "attitude outside level window; world map not updated"
            );
        }

        let mut summary =
            PerceptionSummary::from_classified(classified, rock, self.config.near_field_radius);
        summary.map_updated = map_updated;

        debug!(
            navigable = summary.nav_angles.len(),
            mean_distance = ?summary.mean_distance,
            mean_angle = ?summary.mean_angle,
            rock_nearby = summary.rock.nearby,
            "perception summary"
        );
        Ok(summary)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Mask;
    use crate::rock::CameraAlignment;

    const GROUND: [u8; 3] = [200, 200, 200];
    const SAMPLE: [u8; 3] = [220, 190, 30];

    fn pipeline() -> PerceptionPipeline {
        PerceptionPipeline::new(PerceptionConfig::default(), 320, 160).unwrap()
    }

    fn ground_frame() -> Frame {
        let mut frame = Frame::black(320, 160);
        frame.fill_rect(80..160, 0..320, GROUND);
        frame
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }

    #[test]
    fn open_ground_gives_forward_bearings() {
        let p = pipeline();
        let mut map = p.new_world_map();
        let s = p.process(&ground_frame(), &Telemetry::at_rest(100.0, 100.0, 0.0), &mut map).unwrap();

        assert!(s.has_bearings());
        assert_eq!(s.nav_distances.len(), s.nav_angles.len());
        assert!(s.mean_distance.unwrap() > 100.0, "{:?}", s.mean_distance);
        assert!(s.mean_angle.unwrap().abs() < 0.05, "{:?}", s.mean_angle);
        assert!(s.local_mean_angle.is_some());
        assert_eq!(s.classified.obstacle.count(), 0);
        assert!(!s.rock.nearby);
        assert_eq!(s.rock.camera, CameraAlignment::NotVisible);
    }

    #[test]
    fn level_tick_updates_world_map() {
        let p = pipeline();
        let mut map = p.new_world_map();
        let s = p.process(&ground_frame(), &Telemetry::at_rest(100.0, 100.0, 0.0), &mut map).unwrap();
        assert!(s.map_updated);
        assert!(map.navigable_coverage() > 0);
        // Facing +x, the ground ahead lands east of the rover.
        assert!(map.get(MapChannel::Navigable, 105, 100) > 0);
        assert_eq!(map.get(MapChannel::Navigable, 95, 100), 0);
    }

    #[test]
    fn tilted_tick_leaves_world_map_untouched() {
        let p = pipeline();
        let mut map = p.new_world_map();
        let mut t = Telemetry::at_rest(100.0, 100.0, 0.0);
        t.pose.roll_deg = 10.0;
        let before = map.clone();
        let s = p.process(&ground_frame(), &t, &mut map).unwrap();
        assert!(!s.map_updated);
        assert_eq!(map, before);
        // Bearings are still produced for the decision engine.
        assert!(s.has_bearings());
    }

    #[test]
    fn map_counts_never_decrease_across_ticks() {
        let p = pipeline();
        let mut map = p.new_world_map();
        let t = Telemetry::at_rest(100.0, 100.0, 0.0);
        p.process(&ground_frame(), &t, &mut map).unwrap();
        let first = map.clone();
        p.process(&Frame::black(320, 160), &t, &mut map).unwrap();
        for y in 0..map.size() {
            for x in 0..map.size() {
                for ch in [MapChannel::Obstacle, MapChannel::Rock, MapChannel::Navigable] {
                    assert!(map.get(ch, x, y) >= first.get(ch, x, y));
                }
            }
        }
    }

    #[test]
    fn black_frame_has_no_bearings() {
        let p = pipeline();
        let mut map = p.new_world_map();
        let s = p
            .process(&Frame::black(320, 160), &Telemetry::at_rest(100.0, 100.0, 0.0), &mut map)
            .unwrap();
        assert!(!s.has_bearings());
        assert_eq!(s.mean_distance, None);
        assert_eq!(s.mean_angle, None);
        assert_eq!(s.local_mean_angle, None);
    }

    #[test]
    fn wrong_frame_size_fails_without_mutation() {
        let p = pipeline();
        let mut map = p.new_world_map();
        let before = map.clone();
        let err = p
            .process(&Frame::black(640, 480), &Telemetry::at_rest(100.0, 100.0, 0.0), &mut map)
            .unwrap_err();
        assert!(matches!(err, RoverError::FrameSize { .. }));
        assert_eq!(map, before);
    }

    #[test]
    fn non_finite_telemetry_fails_the_tick() {
        let p = pipeline();
        let mut map = p.new_world_map();
        let mut t = Telemetry::at_rest(100.0, 100.0, 0.0);
        t.pose.yaw_deg = f32::INFINITY;
        assert!(matches!(
            p.process(&ground_frame(), &t, &mut map),
            Err(RoverError::InvalidTelemetry { .. })
        ));
        assert_eq!(map.total(MapChannel::Navigable), 0);
    }

    #[test]
    fn mismatched_world_map_is_rejected() {
        let p = pipeline();
        let mut map = WorldMap::new(50);
        assert!(matches!(
            p.process(&ground_frame(), &Telemetry::at_rest(10.0, 10.0, 0.0), &mut map),
            Err(RoverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn sample_ahead_is_seen_by_both_detectors() {
        let p = pipeline();
        let mut map = p.new_world_map();
        let mut frame = ground_frame();
        frame.fill_rect(100..112, 152..168, SAMPLE);
        let s = p.process(&frame, &Telemetry::at_rest(100.0, 100.0, 0.0), &mut map).unwrap();
        assert!(s.rock.map.is_some());
        assert!(s.rock.nearby);
        assert!(s.rock.camera.is_aligned(), "{:?}", s.rock.camera);
        assert!(map.total(MapChannel::Rock) > 0);
    }

    #[test]
    fn summary_local_mean_uses_near_field_only() {
        let mut c = ClassifiedFrame::empty(320, 160);
        // Near field: just ahead and to the left.
        c.navigable.fill_rect(150..152, 150..152);
        // Far field: straight ahead, 100 rows up.
        c.navigable.fill_rect(60..61, 160..161);
        let s = PerceptionSummary::from_classified(c, RockObservation::none(), 20.0);
        assert_eq!(s.nav_angles.len(), 5);
        let local = s.local_mean_angle.unwrap();
        assert!(local > 0.5, "near-field pixels are to the left, got {local}");
        assert!(s.mean_angle.unwrap() < local);
    }

    #[test]
    fn summary_without_near_field_has_no_local_angle() {
        let mut navigable = Mask::new(320, 160);
        navigable.fill_rect(40..50, 150..170);
        let c = ClassifiedFrame {
            navigable,
            obstacle: Mask::new(320, 160),
            rock: Mask::new(320, 160),
        };
        let s = PerceptionSummary::from_classified(c, RockObservation::none(), 20.0);
        assert!(s.mean_angle.is_some());
        assert_eq!(s.local_mean_angle, None);
    }

    #[test]
    fn invalid_config_fails_fast() {
        let mut cfg = PerceptionConfig::default();
        cfg.world.scale = 0.0;
        assert!(PerceptionPipeline::new(cfg, 320, 160).is_err());

        let mut cfg = PerceptionConfig::default();
        cfg.colors.rock_hsv_lower = [30, 150, 150];
        assert!(PerceptionPipeline::new(cfg, 320, 160).is_err());

        assert!(PerceptionPipeline::new(PerceptionConfig::default(), 0, 160).is_err());
    }

    #[test]
    fn world_size_is_bounded() {
        let mut cfg = PerceptionConfig::default();
        cfg.world.size = 0;
        assert!(matches!(cfg.validate(), Err(RoverError::InvalidConfig(_))));

        cfg.world.size = 1 << 33;
        assert!(matches!(cfg.validate(), Err(RoverError::InvalidConfig(_))));
        assert!(PerceptionPipeline::new(cfg, 320, 160).is_err());

        cfg.world.size = MAX_WORLD_SIZE;
        cfg.validate().unwrap();
    }
}
