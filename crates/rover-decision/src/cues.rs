//! Per-tick decision cues.
//!
//! [`Cues::extract`] reduces a [`PerceptionSummary`] and a telemetry record
//! to the handful of booleans and bearings the state machine branches on.
//! Undefined quantities stay `Option`s here; the engine decides what an
//! absent bearing means in each mode.

use rover_perception::pipeline::{PerceptionSummary, mean};
use rover_perception::rock::CameraAlignment;
use rover_perception::transform::rover_centric_offset;
use rover_types::Telemetry;

use crate::profile::DecisionProfile;

/// Which side of the rover has fewer wheel-path obstacle hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearSide {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cues {
    pub has_bearings: bool,
    pub mean_distance: Option<f32>,
    /// Mean navigable angle, degrees.
    pub mean_angle_deg: Option<f32>,
    /// Mean near-field navigable angle, degrees.
    pub local_mean_angle_deg: Option<f32>,
    /// Mean navigable angle of the left (`> 0`) bearings, degrees.
    pub left_angle_deg: Option<f32>,
    /// Mean navigable angle of the right (`<= 0`) bearings, degrees.
    pub right_angle_deg: Option<f32>,

    pub obstacle_in_way: bool,
    pub left_hits: usize,
    pub right_hits: usize,
    pub obstacle_left: bool,
    pub obstacle_right: bool,
    /// Neither extended window holds an obstacle.
    pub front_clear: bool,

    /// Near-field heading is within the good-angle band.
    pub good_angle: bool,

    pub rock_nearby: bool,
    pub camera: CameraAlignment,

    pub velocity: f32,
    pub stationary: bool,
    pub near_sample: bool,
    pub picking_up: bool,
    pub return_home: bool,
    pub distance_home: f32,
    /// Lateral offset of the start position; positive is to the left.
    pub home_lateral: f32,
}

impl Cues {
    pub fn extract(summary: &PerceptionSummary, telemetry: &Telemetry, profile: &DecisionProfile) -> Self {
        let obstacle = &summary.classified.obstacle;
        let windows = &profile.windows;

        let left: Vec<f32> = summary.nav_angles.iter().copied().filter(|a| *a > 0.0).collect();
        let right: Vec<f32> = summary.nav_angles.iter().copied().filter(|a| *a <= 0.0).collect();

        let left_hits = windows.front_left.hits(obstacle);
        let right_hits = windows.front_right.hits(obstacle);

        let pose = &telemetry.pose;
        let (_, home_lateral) =
            rover_centric_offset(telemetry.start_x, telemetry.start_y, pose.x, pose.y, pose.yaw_deg);

        Self {
            has_bearings: summary.has_bearings(),
            mean_distance: summary.mean_distance,
            mean_angle_deg: summary.mean_angle.map(f32::to_degrees),
            local_mean_angle_deg: summary.local_mean_angle.map(f32::to_degrees),
            left_angle_deg: mean(&left).map(f32::to_degrees),
            right_angle_deg: mean(&right).map(f32::to_degrees),

            obstacle_in_way: windows.front_bumper.is_triggered(obstacle),
            obstacle_left: left_hits >= windows.front_left.min_hits,
            obstacle_right: right_hits >= windows.front_right.min_hits,
            left_hits,
            right_hits,
            front_clear: !windows.extended_far.is_triggered(obstacle)
                && !windows.extended_near.is_triggered(obstacle),

            good_angle: summary
                .local_mean_angle
                .is_some_and(|a| a.abs() < profile.good_angle_rad),

            rock_nearby: summary.rock.nearby,
            camera: summary.rock.camera,

            velocity: telemetry.velocity,
            stationary: profile.is_stationary(telemetry.velocity),
            near_sample: telemetry.near_sample,
            picking_up: telemetry.picking_up,
            return_home: telemetry.return_home,
            distance_home: telemetry.distance_to_start(),
            home_lateral,
        }
    }

    /// `true` when at least one wheel-path window is triggered.
    pub fn side_obstacle(&self) -> bool {
        self.obstacle_left || self.obstacle_right
    }

    /// The side to steer toward when a wheel-path window is triggered, or
    /// `None` when both sides are equally blocked.
    pub fn clear_side(&self) -> Option<ClearSide> {
        match self.left_hits.cmp(&self.right_hits) {
            std::cmp::Ordering::Greater => Some(ClearSide::Right),
            std::cmp::Ordering::Less => Some(ClearSide::Left),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Mean bearing toward `side`, falling back to the overall mean when
    /// that side holds no navigable pixel.
    pub fn side_angle_deg(&self, side: ClearSide) -> Option<f32> {
        let angle = match side {
            ClearSide::Left => self.left_angle_deg,
            ClearSide::Right => self.right_angle_deg,
        };
        angle.or(self.mean_angle_deg)
    }

    /// Forward should stop: no usable bearing, too close, or blocked.
    pub fn must_stop(&self, profile: &DecisionProfile) -> bool {
        let within_stop = self.mean_distance.is_none_or(|d| d <= profile.stop_distance);
        !self.has_bearings || within_stop || self.obstacle_in_way
    }

    /// Stop may resume driving forward.
    pub fn can_resume(&self, profile: &DecisionProfile) -> bool {
        let far_enough = self.mean_distance.is_some_and(|d| d >= profile.go_distance);
        self.has_bearings && far_enough && !self.obstacle_in_way && self.good_angle
    }

    /// The pickup arm may be triggered. Requires an exact standstill,
    /// whatever `stationary_velocity` the mode logic tolerates.
    pub fn pickup_ready(&self) -> bool {
        self.near_sample && self.velocity == 0.0 && !self.picking_up
    }
}
