//! Decision tuning profiles.
//!
//! Everything the decision engine compares against lives here: distance
//! thresholds, throttle and brake magnitudes, steering constants, and the
//! pixel windows of the classified frame that are checked for obstacles.
//!
//! Two presets ship:
//!
//! | Preset         | Windows            | Side-obstacle response                     |
//! |----------------|--------------------|--------------------------------------------|
//! | `conservative` | wide               | [`AvoidanceStrategy::BrakeAndCreep`]       |
//! | `aggressive`   | tight, wheel-path  | [`AvoidanceStrategy::SteerAway`]           |
//!
//! `conservative` is the default.

use std::fmt;
use std::str::FromStr;

use rover_perception::classify::Mask;
use rover_types::RoverError;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Obstacle windows
// ────────────────────────────────────────────────────────────────────────────

/// A named rectangle of the classified top-down frame.
///
/// `rows` and `cols` are half-open `[start, end)` pixel ranges. The window is
/// triggered when it holds at least `min_hits` obstacle pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleWindow {
    pub rows: [usize; 2],
    pub cols: [usize; 2],
    pub min_hits: usize,
}

impl ObstacleWindow {
    pub const fn new(rows: [usize; 2], cols: [usize; 2], min_hits: usize) -> Self {
        Self {
            rows,
            cols,
            min_hits,
        }
    }

    /// Obstacle pixels inside the window.
    pub fn hits(&self, obstacle: &Mask) -> usize {
        obstacle.count_in(self.rows[0]..self.rows[1], self.cols[0]..self.cols[1])
    }

    pub fn is_triggered(&self, obstacle: &Mask) -> bool {
        self.hits(obstacle) >= self.min_hits
    }

    fn validate(&self, name: &str, width: usize, height: usize) -> Result<(), RoverError> {
        if self.rows[0] >= self.rows[1] || self.cols[0] >= self.cols[1] {
            return Err(RoverError::InvalidConfig(format!("obstacle window `{name}` is empty")));
        }
        if self.rows[1] > height || self.cols[1] > width {
            return Err(RoverError::InvalidConfig(format!(
                "obstacle window `{name}` extends past the {width}x{height} frame"
            )));
        }
        if self.min_hits == 0 {
            return Err(RoverError::InvalidConfig(format!(
                "obstacle window `{name}` needs min_hits >= 1"
            )));
        }
        Ok(())
    }
}

/// The five windows checked every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleWindows {
    /// Directly in front of the bumper; a hit means "obstacle in the way".
    pub front_bumper: ObstacleWindow,
    /// Left wheel path.
    pub front_left: ObstacleWindow,
    /// Right wheel path.
    pub front_right: ObstacleWindow,
    /// Further ahead and to the right.
    pub extended_far: ObstacleWindow,
    /// Just ahead and to the right.
    pub extended_near: ObstacleWindow,
}

impl ObstacleWindows {
    /// Tight wheel-path windows for a 320 × 160 top-down frame.
    pub const fn tight() -> Self {
        Self {
            front_bumper: ObstacleWindow::new([141, 148], [157, 162], 8),
            front_left: ObstacleWindow::new([138, 149], [150, 155], 1),
            front_right: ObstacleWindow::new([138, 148], [164, 167], 1),
            extended_far: ObstacleWindow::new([118, 139], [163, 170], 1),
            extended_near: ObstacleWindow::new([140, 147], [159, 170], 1),
        }
    }

    /// Wider windows for a 320 × 160 top-down frame; they react earlier and
    /// to obstacles further off the wheel path. Hand-tuned around the same
    /// wheel path as [`ObstacleWindows::tight`].
    pub const fn wide() -> Self {
        Self {
            front_bumper: ObstacleWindow::new([138, 149], [155, 165], 8),
            front_left: ObstacleWindow::new([132, 150], [144, 155], 1),
            front_right: ObstacleWindow::new([132, 150], [165, 176], 1),
            extended_far: ObstacleWindow::new([112, 139], [152, 174], 1),
            extended_near: ObstacleWindow::new([139, 150], [155, 174], 1),
        }
    }

    fn named(&self) -> [(&'static str, &ObstacleWindow); 5] {
        [
            ("front_bumper", &self.front_bumper),
            ("front_left", &self.front_left),
            ("front_right", &self.front_right),
            ("extended_far", &self.extended_far),
            ("extended_near", &self.extended_near),
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Profile
// ────────────────────────────────────────────────────────────────────────────

/// How Forward reacts to an obstacle in one of the wheel-path windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidanceStrategy {
    /// Keep cruising and steer toward the clearer side. A clear extended
    /// view takes precedence over a side hit.
    SteerAway,
    /// Slow to a creep and steer toward the clearer side.
    BrakeAndCreep,
}

/// Preset selector, as accepted by `ROVER_PROFILE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Conservative,
    Aggressive,
}

impl FromStr for ProfileKind {
    type Err = RoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(ProfileKind::Conservative),
            "aggressive" => Ok(ProfileKind::Aggressive),
            other => Err(RoverError::InvalidConfig(format!("unknown decision profile `{other}`"))),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::Conservative => f.write_str("conservative"),
            ProfileKind::Aggressive => f.write_str("aggressive"),
        }
    }
}

/// Static tuning of the decision engine. Distances are in rover-frame
/// pixels, angles in degrees unless the name says otherwise, velocities in
/// telemetry units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionProfile {
    pub avoidance: AvoidanceStrategy,

    /// Forward stops once the mean navigable distance drops to this.
    pub stop_distance: f32,
    /// Stop resumes only with at least this much mean navigable distance.
    pub go_distance: f32,
    pub throttle_setting: f32,
    pub throttle_max: f32,
    /// Brake applied when stopping from speed.
    pub brake_setting: f32,
    /// Brake used to hold position (pickup, arrival, losing a rock).
    pub hold_brake: f32,
    /// Forward coasts at or above this velocity.
    pub max_velocity: f32,
    /// Speeds at or below this magnitude count as standing still for mode
    /// changes. The pickup trigger always needs zero velocity.
    pub stationary_velocity: f32,

    /// Absolute limit applied to every steer command.
    pub steer_limit: f32,
    /// Steer used while the extended view ahead is clear.
    pub forward_bias_steer: f32,
    /// Cruise steer range when following the mean navigable angle.
    pub cruise_steer_min: f32,
    pub cruise_steer_max: f32,
    /// Steer used to turn in place while looking for open ground.
    pub stop_turn_steer: f32,
    /// Limit on the steer used when leaving Stop.
    pub resume_steer_limit: f32,
    /// |local mean angle| (radians) below which the heading counts as good.
    pub good_angle_rad: f32,

    /// Steer used to turn in place with no navigable terrain in view.
    pub failsafe_steer: f32,
    /// Consecutive blind ticks before Failsafe takes over.
    pub failsafe_entry_ticks: u32,

    /// Steer used to turn in place while no rock is in the camera view.
    pub rock_search_steer: f32,
    /// Steer step used to center a rock in the camera view.
    pub rock_align_step: f32,
    /// Ticks of searching in InitRockStop before giving up.
    pub rock_search_limit_ticks: u32,
    pub crawl_throttle: f32,
    pub crawl_max_velocity: f32,

    /// BrakeAndCreep throttle while a wheel-path window is triggered.
    pub creep_throttle: f32,
    /// BrakeAndCreep brakes above this velocity while creeping.
    pub creep_velocity: f32,

    /// Forward heads home once `return_home` is set and the rover is this
    /// close (world cells) to its start.
    pub home_trigger_distance: f32,
    /// Lateral home offset (world cells) that counts as facing home.
    pub home_lateral_band: f32,
    pub home_steer_step: f32,
    /// Distance to start (world cells) that counts as arrived.
    pub home_arrival_distance: f32,
    pub home_throttle: f32,
    pub home_max_velocity: f32,

    pub windows: ObstacleWindows,
}

impl Default for DecisionProfile {
    fn default() -> Self {
        Self::conservative()
    }
}

impl DecisionProfile {
    pub fn preset(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Conservative => Self::conservative(),
            ProfileKind::Aggressive => Self::aggressive(),
        }
    }

    /// Wide windows, slows down near obstacles.
    pub fn conservative() -> Self {
        Self {
            windows: ObstacleWindows::wide(),
            avoidance: AvoidanceStrategy::BrakeAndCreep,
            stop_distance: 50.0,
            go_distance: 60.0,
            throttle_setting: 0.2,
            throttle_max: 1.0,
            brake_setting: 10.0,
            hold_brake: 1.0,
            max_velocity: 1.5,
            stationary_velocity: 0.0,
            steer_limit: 15.0,
            forward_bias_steer: -8.0,
            cruise_steer_min: -15.0,
            cruise_steer_max: 12.0,
            stop_turn_steer: 7.0,
            resume_steer_limit: 10.0,
            good_angle_rad: 0.1,
            failsafe_steer: 5.0,
            failsafe_entry_ticks: 1,
            rock_search_steer: -5.0,
            rock_align_step: 2.0,
            rock_search_limit_ticks: 120,
            crawl_throttle: 0.5,
            crawl_max_velocity: 0.5,
            creep_throttle: 0.1,
            creep_velocity: 0.5,
            home_trigger_distance: 4.0,
            home_lateral_band: 0.1,
            home_steer_step: 2.0,
            home_arrival_distance: 0.1,
            home_throttle: 0.5,
            home_max_velocity: 0.5,
        }
    }

    /// Tight wheel-path windows, keeps cruising around obstacles.
    pub fn aggressive() -> Self {
        Self {
            windows: ObstacleWindows::tight(),
            avoidance: AvoidanceStrategy::SteerAway,
            max_velocity: 2.0,
            ..Self::conservative()
        }
    }

    /// `true` for a speed that counts as standing still.
    pub fn is_stationary(&self, velocity: f32) -> bool {
        velocity.abs() <= self.stationary_velocity
    }

    /// Check the profile against a `width` × `height` classified frame.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidConfig`] naming the first offending setting.
    pub fn validate(&self, width: usize, height: usize) -> Result<(), RoverError> {
        let fail = |msg: String| Err(RoverError::InvalidConfig(msg));

        if !(self.stop_distance > 0.0) {
            return fail(format!("stop_distance must be positive, got {}", self.stop_distance));
        }
        if !(self.go_distance >= self.stop_distance) {
            return fail(format!(
                "go_distance {} is below stop_distance {}",
                self.go_distance, self.stop_distance
            ));
        }
        if !(self.max_velocity > 0.0) {
            return fail(format!("max_velocity must be positive, got {}", self.max_velocity));
        }
        if !(self.throttle_max > 0.0) {
            return fail(format!("throttle_max must be positive, got {}", self.throttle_max));
        }
        for (name, value) in [
            ("throttle_setting", self.throttle_setting),
            ("crawl_throttle", self.crawl_throttle),
            ("creep_throttle", self.creep_throttle),
            ("home_throttle", self.home_throttle),
        ] {
            if !(value > 0.0 && value <= self.throttle_max) {
                return fail(format!(
                    "{name} must be in (0, {}], got {value}",
                    self.throttle_max
                ));
            }
        }
        for (name, value) in [
            ("brake_setting", self.brake_setting),
            ("hold_brake", self.hold_brake),
            ("stationary_velocity", self.stationary_velocity),
        ] {
            if !(value >= 0.0) {
                return fail(format!("{name} must not be negative, got {value}"));
            }
        }
        if !(self.steer_limit > 0.0) {
            return fail(format!("steer_limit must be positive, got {}", self.steer_limit));
        }
        if !(self.cruise_steer_min <= self.cruise_steer_max) {
            return fail("cruise_steer_min exceeds cruise_steer_max".to_string());
        }
        if !(self.good_angle_rad > 0.0) {
            return fail(format!("good_angle_rad must be positive, got {}", self.good_angle_rad));
        }
        if self.failsafe_entry_ticks == 0 {
            return fail("failsafe_entry_ticks must be at least 1".to_string());
        }
        if !(self.home_lateral_band > 0.0 && self.home_arrival_distance > 0.0) {
            return fail("home_lateral_band and home_arrival_distance must be positive".to_string());
        }
        for (name, window) in self.windows.named() {
            window.validate(name, width, height)?;
        }
        Ok(())
    }
}
