//! Navigation decision engine.
//!
//! One state machine, parameterized by a [`DecisionProfile`]:
//!
//! ```text
//!            rock nearby                 aligned
//! Forward ──────────────► InitRockStop ──────────► RockCrawl
//!   ▲  │ blocked / close      │ search timeout        │ near sample
//!   │  ▼                      ▼                       ▼
//!   └─ Stop ◄─────────────────┴───────────────────────┘
//!       ▲                     ◄── rock lost (RockCrawl → InitRockStop)
//!       │ bearings back
//!   Failsafe ◄── no bearings (any mode but Finished)
//!
//! Forward ──► DirectHome ──► GoHome ──► Finished
//!   return_home   facing home    arrived
//! ```
//!
//! [`DecisionEngine::step`] is a pure function of the previous
//! [`RoverState`], the tick's perception summary and telemetry: the same
//! inputs always produce the same successor state. Every command leaving it
//! is finite and clamped to the profile's limits.
//!
//! # Example
//!
//! ```rust
//! use rover_decision::{DecisionEngine, DecisionProfile, RoverState};
//! use rover_perception::PerceptionSummary;
//! use rover_types::{RoverMode, Telemetry};
//!
//! let engine = DecisionEngine::new(DecisionProfile::default(), 320, 160).unwrap();
//! let blind = PerceptionSummary::blind(320, 160);
//!
//! let next = engine.step(&RoverState::default(), &blind, &Telemetry::at_rest(0.0, 0.0, 0.0));
//! assert_eq!(next.mode, RoverMode::Failsafe);
//! ```

use rover_perception::PerceptionSummary;
use rover_perception::rock::CameraAlignment;
use rover_types::{ActuationCommand, RoverError, RoverMode, Telemetry};
use tracing::{info, warn};

use crate::cues::Cues;
use crate::profile::{AvoidanceStrategy, DecisionProfile};
use crate::state::RoverState;

/// The per-tick mode transition and actuation policy.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    profile: DecisionProfile,
}

impl DecisionEngine {
    /// Build an engine for a `width` × `height` classified frame.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidConfig`] when the profile fails validation.
    pub fn new(profile: DecisionProfile, width: usize, height: usize) -> Result<Self, RoverError> {
        profile.validate(width, height)?;
        Ok(Self { profile })
    }

    pub fn profile(&self) -> &DecisionProfile {
        &self.profile
    }

    /// Decide the next state from the previous one and this tick's inputs.
    pub fn step(&self, state: &RoverState, summary: &PerceptionSummary, telemetry: &Telemetry) -> RoverState {
        let p = &self.profile;
        let cues = Cues::extract(summary, telemetry, p);

        let blind_ticks = if cues.has_bearings {
            0
        } else {
            state.blind_ticks.saturating_add(1)
        };

        let mode = if blind_ticks >= p.failsafe_entry_ticks
            && !state.mode.is_terminal()
            && state.mode != RoverMode::Failsafe
        {
            RoverMode::Failsafe
        } else {
            state.mode
        };

        let (next_mode, command) = match mode {
            RoverMode::Forward => self.forward(&cues),
            RoverMode::Stop => self.stop(&cues),
            RoverMode::InitRockStop => self.init_rock_stop(&cues, state.ticks_in_mode),
            RoverMode::RockCrawl => self.rock_crawl(&cues),
            RoverMode::DirectHome => self.direct_home(&cues),
            RoverMode::GoHome => self.go_home(&cues),
            RoverMode::Finished => (RoverMode::Finished, ActuationCommand::braking(p.hold_brake)),
            RoverMode::Failsafe => self.failsafe(&cues),
        };

        let ticks_in_mode = if next_mode == state.mode {
            state.ticks_in_mode.saturating_add(1)
        } else {
            info!(from = %state.mode, to = %next_mode, blind_ticks, "mode transition");
            0
        };

        RoverState {
            mode: next_mode,
            command: self.sanitize(command),
            send_pickup: cues.pickup_ready(),
            ticks_in_mode,
            blind_ticks,
        }
    }

    // ── Modes ────────────────────────────────────────────────────────────────

    fn forward(&self, c: &Cues) -> (RoverMode, ActuationCommand) {
        let p = &self.profile;
        if c.return_home && c.distance_home <= p.home_trigger_distance {
            return (RoverMode::DirectHome, ActuationCommand::braking(p.brake_setting));
        }
        if c.rock_nearby {
            return (RoverMode::InitRockStop, ActuationCommand::braking(p.brake_setting));
        }
        if c.must_stop(p) {
            return (RoverMode::Stop, ActuationCommand::braking(p.brake_setting));
        }

        let throttle = if c.velocity < p.max_velocity {
            p.throttle_setting
        } else {
            0.0
        };

        let command = match p.avoidance {
            AvoidanceStrategy::SteerAway => {
                let steer = if c.front_clear {
                    p.forward_bias_steer
                } else if c.side_obstacle() {
                    self.avoidance_steer(c)
                } else {
                    self.cruise_steer(c)
                };
                ActuationCommand::new(throttle, 0.0, steer)
            }
            AvoidanceStrategy::BrakeAndCreep if c.side_obstacle() => {
                let steer = self.avoidance_steer(c);
                if c.velocity > p.creep_velocity {
                    ActuationCommand::new(0.0, p.hold_brake, steer)
                } else {
                    ActuationCommand::new(p.creep_throttle, 0.0, steer)
                }
            }
            AvoidanceStrategy::BrakeAndCreep => {
                let steer = if c.front_clear {
                    p.forward_bias_steer
                } else {
                    self.cruise_steer(c)
                };
                ActuationCommand::new(throttle, 0.0, steer)
            }
        };
        (RoverMode::Forward, command)
    }

    fn stop(&self, c: &Cues) -> (RoverMode, ActuationCommand) {
        let p = &self.profile;
        if c.near_sample {
            return (RoverMode::Stop, ActuationCommand::braking(p.hold_brake));
        }
        if !c.stationary {
            return (RoverMode::Stop, ActuationCommand::braking(p.brake_setting));
        }
        if !c.can_resume(p) {
            return (RoverMode::Stop, ActuationCommand::turn_in_place(p.stop_turn_steer));
        }
        let steer = c
            .local_mean_angle_deg
            .map_or(0.0, |a| a.clamp(-p.resume_steer_limit, p.resume_steer_limit));
        (RoverMode::Forward, ActuationCommand::new(p.throttle_setting, 0.0, steer))
    }

    fn init_rock_stop(&self, c: &Cues, ticks_in_mode: u32) -> (RoverMode, ActuationCommand) {
        let p = &self.profile;
        if !c.stationary {
            return (RoverMode::InitRockStop, ActuationCommand::braking(p.hold_brake));
        }
        match c.camera {
            CameraAlignment::Visible { aligned: true, .. } => {
                (RoverMode::RockCrawl, ActuationCommand::default())
            }
            _ if ticks_in_mode >= p.rock_search_limit_ticks => {
                (RoverMode::Stop, ActuationCommand::braking(p.hold_brake))
            }
            CameraAlignment::NotVisible => (
                RoverMode::InitRockStop,
                ActuationCommand::turn_in_place(p.rock_search_steer),
            ),
            CameraAlignment::Visible { offset_px, .. } => (
                RoverMode::InitRockStop,
                ActuationCommand::turn_in_place(self.align_steer(offset_px)),
            ),
        }
    }

    fn rock_crawl(&self, c: &Cues) -> (RoverMode, ActuationCommand) {
        let p = &self.profile;
        if c.near_sample {
            return (RoverMode::Stop, ActuationCommand::braking(p.hold_brake));
        }
        let CameraAlignment::Visible {
            offset_px, aligned, ..
        } = c.camera
        else {
            return (RoverMode::InitRockStop, ActuationCommand::braking(p.hold_brake));
        };

        let throttle = if c.velocity > p.crawl_max_velocity {
            0.0
        } else {
            p.crawl_throttle
        };
        let steer = if aligned { 0.0 } else { self.align_steer(offset_px) };
        (RoverMode::RockCrawl, ActuationCommand::new(throttle, 0.0, steer))
    }

    fn direct_home(&self, c: &Cues) -> (RoverMode, ActuationCommand) {
        let p = &self.profile;
        if !c.stationary {
            return (RoverMode::DirectHome, ActuationCommand::braking(p.brake_setting));
        }
        match self.home_steer(c) {
            Some(steer) => (RoverMode::DirectHome, ActuationCommand::turn_in_place(steer)),
            None => (RoverMode::GoHome, ActuationCommand::default()),
        }
    }

    fn go_home(&self, c: &Cues) -> (RoverMode, ActuationCommand) {
        let p = &self.profile;
        if c.distance_home <= p.home_arrival_distance {
            return (RoverMode::Finished, ActuationCommand::braking(p.hold_brake));
        }
        let throttle = if c.velocity > p.home_max_velocity {
            0.0
        } else {
            p.home_throttle
        };
        let steer = self.home_steer(c).unwrap_or(0.0);
        (RoverMode::GoHome, ActuationCommand::new(throttle, 0.0, steer))
    }

    fn failsafe(&self, c: &Cues) -> (RoverMode, ActuationCommand) {
        let p = &self.profile;
        if c.has_bearings {
            return (RoverMode::Stop, ActuationCommand::braking(p.brake_setting));
        }
        if !c.stationary {
            return (RoverMode::Failsafe, ActuationCommand::braking(p.brake_setting));
        }
        (RoverMode::Failsafe, ActuationCommand::turn_in_place(p.failsafe_steer))
    }

    // ── Steering helpers ─────────────────────────────────────────────────────

    /// Mean navigable angle, clamped to the cruise range.
    fn cruise_steer(&self, c: &Cues) -> f32 {
        let p = &self.profile;
        c.mean_angle_deg
            .map_or(0.0, |a| a.clamp(p.cruise_steer_min, p.cruise_steer_max))
    }

    /// Toward the side with fewer wheel-path hits.
    fn avoidance_steer(&self, c: &Cues) -> f32 {
        let p = &self.profile;
        match c.clear_side() {
            Some(side) => c
                .side_angle_deg(side)
                .map_or(0.0, |a| a.clamp(-p.steer_limit, p.steer_limit)),
            None => self.cruise_steer(c),
        }
    }

    /// A rock left of centre (negative offset) needs a left (positive) turn.
    fn align_steer(&self, offset_px: f32) -> f32 {
        if offset_px < 0.0 {
            self.profile.rock_align_step
        } else {
            -self.profile.rock_align_step
        }
    }

    /// Correction toward home, or `None` when already facing it.
    fn home_steer(&self, c: &Cues) -> Option<f32> {
        let p = &self.profile;
        if c.home_lateral > p.home_lateral_band {
            Some(p.home_steer_step)
        } else if c.home_lateral < -p.home_lateral_band {
            Some(-p.home_steer_step)
        } else {
            None
        }
    }

    fn sanitize(&self, command: ActuationCommand) -> ActuationCommand {
        let p = &self.profile;
        let finite = |field: &str, value: f32| {
            if value.is_finite() {
                value
            } else {
                warn!(field, value, "non-finite actuation value replaced by zero");
                0.0
            }
        };
        ActuationCommand {
            throttle: finite("throttle", command.throttle).clamp(0.0, p.throttle_max),
            brake: finite("brake", command.brake).max(0.0),
            steer: finite("steer", command.steer).clamp(-p.steer_limit, p.steer_limit),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rover_perception::classify::ClassifiedFrame;
    use rover_perception::rock::RockObservation;

    fn engine(profile: DecisionProfile) -> DecisionEngine {
        DecisionEngine::new(profile, 320, 160).unwrap()
    }

    fn summary(rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) -> PerceptionSummary {
        let mut c = ClassifiedFrame::empty(320, 160);
        c.navigable.fill_rect(rows, cols);
        PerceptionSummary::from_classified(c, RockObservation::none(), 20.0)
    }

    /// Wide open ground ahead: mean distance ≈ 68, heading ≈ 0.
    fn open() -> PerceptionSummary {
        summary(40..150, 130..190)
    }

    /// Navigable ground only just in front of the rover.
    fn close() -> PerceptionSummary {
        summary(130..150, 150..170)
    }

    fn blind() -> PerceptionSummary {
        PerceptionSummary::blind(320, 160)
    }

    fn with_camera(mut s: PerceptionSummary, camera: CameraAlignment) -> PerceptionSummary {
        s.rock.camera = camera;
        s
    }

    fn visible(offset_px: f32, aligned: bool) -> CameraAlignment {
        CameraAlignment::Visible {
            centroid_col: 159.5 + offset_px,
            offset_px,
            aligned,
        }
    }

    fn rest() -> Telemetry {
        Telemetry::at_rest(50.0, 50.0, 0.0)
    }

    fn moving(velocity: f32) -> Telemetry {
        Telemetry {
            velocity,
            ..rest()
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    // ── Forward ──────────────────────────────────────────────────────────────

    #[test]
    fn forward_open_ground_cruises_with_bias() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::default(), &open(), &rest());
        assert_eq!(next.mode, RoverMode::Forward);
        assert_eq!(next.command, ActuationCommand::new(p.throttle_setting, 0.0, p.forward_bias_steer));
        assert_eq!(next.ticks_in_mode, 1);
    }

    #[test]
    fn forward_coasts_at_max_velocity() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::default(), &open(), &moving(p.max_velocity));
        assert_eq!(next.mode, RoverMode::Forward);
        assert_eq!(next.command.throttle, 0.0);
    }

    #[test]
    fn forward_stops_when_terrain_is_close() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::default(), &close(), &moving(1.0));
        assert_eq!(next.mode, RoverMode::Stop);
        assert_eq!(next.command, ActuationCommand::braking(p.brake_setting));
        assert_eq!(next.ticks_in_mode, 0);
    }

    #[test]
    fn forward_stops_for_obstacle_at_bumper() {
        let mut s = open();
        s.classified.obstacle.fill_rect(141..148, 157..162);
        let next = engine(DecisionProfile::aggressive()).step(&RoverState::default(), &s, &moving(1.0));
        assert_eq!(next.mode, RoverMode::Stop);
    }

    #[test]
    fn forward_without_bearings_stops_below_failsafe_threshold() {
        let p = DecisionProfile {
            failsafe_entry_ticks: 3,
            ..DecisionProfile::default()
        };
        let next = engine(p).step(&RoverState::default(), &blind(), &moving(1.0));
        assert_eq!(next.mode, RoverMode::Stop);
        assert_eq!(next.blind_ticks, 1);
    }

    #[test]
    fn forward_rock_nearby_starts_rock_stop() {
        let mut s = open();
        s.rock.nearby = true;
        let next = engine(DecisionProfile::default()).step(&RoverState::default(), &s, &moving(1.0));
        assert_eq!(next.mode, RoverMode::InitRockStop);
        assert_eq!(next.command.throttle, 0.0);
        assert!(next.command.brake > 0.0);
    }

    #[test]
    fn forward_heads_home_when_mission_done_and_close() {
        let mut t = rest();
        t.return_home = true;
        t.start_x = 52.0;
        let next = engine(DecisionProfile::default()).step(&RoverState::default(), &open(), &t);
        assert_eq!(next.mode, RoverMode::DirectHome);

        // Too far from start: keep exploring.
        t.start_x = 80.0;
        let next = engine(DecisionProfile::default()).step(&RoverState::default(), &open(), &t);
        assert_eq!(next.mode, RoverMode::Forward);
    }

    // ── Avoidance strategies ─────────────────────────────────────────────────

    #[test]
    fn steer_away_prefers_bias_when_extended_view_is_clear() {
        let p = DecisionProfile::aggressive();
        let mut s = open();
        s.classified.obstacle.fill_rect(140..145, 150..155);
        let next = engine(p).step(&RoverState::default(), &s, &rest());
        assert_eq!(next.command.steer, p.forward_bias_steer);
    }

    #[test]
    fn steer_away_turns_from_left_obstacle() {
        let p = DecisionProfile::aggressive();
        let mut s = open();
        s.classified.obstacle.fill_rect(140..145, 150..155);
        s.classified.obstacle.fill_rect(120..130, 163..170);
        let next = engine(p).step(&RoverState::default(), &s, &rest());
        assert_eq!(next.mode, RoverMode::Forward);
        assert_eq!(next.command.throttle, p.throttle_setting);
        // Right-hand bearings average about -16°, clamped to the limit.
        assert!(approx(next.command.steer, -p.steer_limit), "{:?}", next.command);
    }

    #[test]
    fn steer_away_follows_mean_without_side_hits() {
        let p = DecisionProfile::aggressive();
        let mut s = open();
        s.classified.obstacle.fill_rect(120..130, 163..170);
        let next = engine(p).step(&RoverState::default(), &s, &rest());
        let expected = s.mean_angle.unwrap().to_degrees();
        assert!(approx(next.command.steer, expected), "{} vs {expected}", next.command.steer);
    }

    #[test]
    fn steer_away_cruises_when_both_sides_are_equally_blocked() {
        let p = DecisionProfile::aggressive();
        let mut s = open();
        s.classified.obstacle.fill_rect(140..142, 150..152);
        s.classified.obstacle.fill_rect(140..142, 164..166);
        let next = engine(p).step(&RoverState::default(), &s, &rest());
        assert_eq!(next.mode, RoverMode::Forward);
        let expected = s
            .mean_angle
            .unwrap()
            .to_degrees()
            .clamp(p.cruise_steer_min, p.cruise_steer_max);
        assert!(approx(next.command.steer, expected), "{} vs {expected}", next.command.steer);
    }

    #[test]
    fn brake_and_creep_slows_for_side_obstacle() {
        let p = DecisionProfile::conservative();
        let mut s = open();
        s.classified.obstacle.fill_rect(140..145, 145..150);

        let next = engine(p).step(&RoverState::default(), &s, &rest());
        assert_eq!(next.mode, RoverMode::Forward);
        assert_eq!(next.command.throttle, p.creep_throttle);
        assert_eq!(next.command.brake, 0.0);
        assert!(next.command.steer < 0.0, "left obstacle should steer right");

        let next = engine(p).step(&RoverState::default(), &s, &moving(1.0));
        assert_eq!(next.command.throttle, 0.0);
        assert_eq!(next.command.brake, p.hold_brake);
    }

    #[test]
    fn brake_and_creep_steers_left_for_right_obstacle() {
        let p = DecisionProfile::conservative();
        let mut s = open();
        s.classified.obstacle.fill_rect(140..145, 168..174);
        let next = engine(p).step(&RoverState::default(), &s, &rest());
        assert!(next.command.steer > 0.0, "{:?}", next.command);
    }

    // ── Stop ─────────────────────────────────────────────────────────────────

    #[test]
    fn stop_keeps_braking_while_moving() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::in_mode(RoverMode::Stop), &open(), &moving(0.8));
        assert_eq!(next.mode, RoverMode::Stop);
        assert_eq!(next.command, ActuationCommand::braking(p.brake_setting));
    }

    #[test]
    fn stop_turns_in_place_without_enough_terrain() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::in_mode(RoverMode::Stop), &close(), &rest());
        assert_eq!(next.mode, RoverMode::Stop);
        assert_eq!(next.command, ActuationCommand::turn_in_place(p.stop_turn_steer));
    }

    #[test]
    fn stop_resumes_forward_on_open_ground() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::in_mode(RoverMode::Stop), &open(), &rest());
        assert_eq!(next.mode, RoverMode::Forward);
        assert_eq!(next.command.throttle, p.throttle_setting);
        assert_eq!(next.command.brake, 0.0);
        assert!(next.command.steer.abs() <= p.resume_steer_limit);
    }

    #[test]
    fn stop_holds_brake_near_sample() {
        let p = DecisionProfile::default();
        let mut t = rest();
        t.near_sample = true;
        let next = engine(p).step(&RoverState::in_mode(RoverMode::Stop), &open(), &t);
        assert_eq!(next.mode, RoverMode::Stop);
        assert_eq!(next.command, ActuationCommand::braking(p.hold_brake));
        assert!(next.send_pickup);
    }

    // ── Rock approach ────────────────────────────────────────────────────────

    #[test]
    fn init_rock_stop_brakes_until_stationary() {
        let p = DecisionProfile::default();
        let s = with_camera(open(), visible(0.0, true));
        let next = engine(p).step(&RoverState::in_mode(RoverMode::InitRockStop), &s, &moving(0.4));
        assert_eq!(next.mode, RoverMode::InitRockStop);
        assert_eq!(next.command, ActuationCommand::braking(p.hold_brake));
    }

    #[test]
    fn init_rock_stop_searches_when_rock_not_visible() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::in_mode(RoverMode::InitRockStop), &open(), &rest());
        assert_eq!(next.mode, RoverMode::InitRockStop);
        assert_eq!(next.command, ActuationCommand::turn_in_place(p.rock_search_steer));
    }

    #[test]
    fn init_rock_stop_turns_toward_rock() {
        let p = DecisionProfile::default();
        let e = engine(p);
        let state = RoverState::in_mode(RoverMode::InitRockStop);

        let left = e.step(&state, &with_camera(open(), visible(-30.0, false)), &rest());
        assert_eq!(left.command.steer, p.rock_align_step);

        let right = e.step(&state, &with_camera(open(), visible(30.0, false)), &rest());
        assert_eq!(right.command.steer, -p.rock_align_step);
        assert_eq!(right.mode, RoverMode::InitRockStop);
    }

    #[test]
    fn init_rock_stop_aligned_starts_crawl() {
        let next = engine(DecisionProfile::default()).step(
            &RoverState::in_mode(RoverMode::InitRockStop),
            &with_camera(open(), visible(0.5, true)),
            &rest(),
        );
        assert_eq!(next.mode, RoverMode::RockCrawl);
        assert_eq!(next.command, ActuationCommand::default());
    }

    #[test]
    fn init_rock_stop_gives_up_after_search_limit() {
        let p = DecisionProfile::default();
        let state = RoverState {
            ticks_in_mode: p.rock_search_limit_ticks,
            ..RoverState::in_mode(RoverMode::InitRockStop)
        };
        let next = engine(p).step(&state, &open(), &rest());
        assert_eq!(next.mode, RoverMode::Stop);
    }

    #[test]
    fn rock_crawl_creeps_toward_aligned_rock() {
        let p = DecisionProfile::default();
        let e = engine(p);
        let state = RoverState::in_mode(RoverMode::RockCrawl);
        let s = with_camera(open(), visible(1.0, true));

        let next = e.step(&state, &s, &moving(0.2));
        assert_eq!(next.mode, RoverMode::RockCrawl);
        assert_eq!(next.command, ActuationCommand::new(p.crawl_throttle, 0.0, 0.0));

        let next = e.step(&state, &s, &moving(0.8));
        assert_eq!(next.command.throttle, 0.0);

        let next = e.step(&state, &with_camera(open(), visible(-12.0, false)), &moving(0.2));
        assert_eq!(next.command.steer, p.rock_align_step);
    }

    #[test]
    fn rock_crawl_that_loses_rock_searches_again() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::in_mode(RoverMode::RockCrawl), &open(), &moving(0.2));
        assert_eq!(next.mode, RoverMode::InitRockStop);
        assert_eq!(next.command, ActuationCommand::braking(p.hold_brake));
    }

    #[test]
    fn rock_crawl_stops_at_sample() {
        let p = DecisionProfile::default();
        let mut t = moving(0.3);
        t.near_sample = true;
        let s = with_camera(open(), visible(0.0, true));
        let next = engine(p).step(&RoverState::in_mode(RoverMode::RockCrawl), &s, &t);
        assert_eq!(next.mode, RoverMode::Stop);
        assert_eq!(next.command, ActuationCommand::braking(p.hold_brake));
        // Still rolling: no pickup yet.
        assert!(!next.send_pickup);
    }

    // ── Return home ──────────────────────────────────────────────────────────

    #[test]
    fn direct_home_turns_until_facing_start() {
        let p = DecisionProfile::default();
        let e = engine(p);
        let state = RoverState::in_mode(RoverMode::DirectHome);

        // Facing east, start to the north: turn left.
        let mut t = rest();
        t.start_y = 60.0;
        let next = e.step(&state, &open(), &t);
        assert_eq!(next.mode, RoverMode::DirectHome);
        assert_eq!(next.command, ActuationCommand::turn_in_place(p.home_steer_step));

        // Start to the south: turn right.
        t.start_y = 40.0;
        assert_eq!(e.step(&state, &open(), &t).command.steer, -p.home_steer_step);

        // Start straight ahead.
        t.start_y = 50.0;
        t.start_x = 60.0;
        let next = e.step(&state, &open(), &t);
        assert_eq!(next.mode, RoverMode::GoHome);
    }

    #[test]
    fn direct_home_brakes_while_moving() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::in_mode(RoverMode::DirectHome), &open(), &moving(0.5));
        assert_eq!(next.mode, RoverMode::DirectHome);
        assert_eq!(next.command, ActuationCommand::braking(p.brake_setting));
    }

    #[test]
    fn go_home_drives_then_finishes() {
        let p = DecisionProfile::default();
        let e = engine(p);
        let state = RoverState::in_mode(RoverMode::GoHome);

        let mut t = moving(0.2);
        t.start_x = 53.0;
        let next = e.step(&state, &open(), &t);
        assert_eq!(next.mode, RoverMode::GoHome);
        assert_eq!(next.command, ActuationCommand::new(p.home_throttle, 0.0, 0.0));

        t.start_x = 50.05;
        let next = e.step(&state, &open(), &t);
        assert_eq!(next.mode, RoverMode::Finished);
        assert_eq!(next.command, ActuationCommand::braking(p.hold_brake));
    }

    #[test]
    fn finished_is_terminal() {
        let p = DecisionProfile::default();
        let e = engine(p);
        let state = RoverState::in_mode(RoverMode::Finished);
        let mut rock = open();
        rock.rock.nearby = true;
        for s in [open(), blind(), rock] {
            let next = e.step(&state, &s, &moving(0.3));
            assert_eq!(next.mode, RoverMode::Finished);
            assert_eq!(next.command, ActuationCommand::braking(p.hold_brake));
        }
    }

    // ── Failsafe ─────────────────────────────────────────────────────────────

    #[test]
    fn failsafe_entered_after_configured_blind_ticks_and_left_in_one() {
        let p = DecisionProfile {
            failsafe_entry_ticks: 3,
            ..DecisionProfile::default()
        };
        let e = engine(p);
        let mut state = RoverState::default();
        for tick in 1..=3 {
            state = e.step(&state, &blind(), &rest());
            assert_eq!(state.blind_ticks, tick);
            if tick < 3 {
                assert_ne!(state.mode, RoverMode::Failsafe, "tick {tick}");
            }
        }
        assert_eq!(state.mode, RoverMode::Failsafe);
        assert_eq!(state.command, ActuationCommand::turn_in_place(p.failsafe_steer));

        let state = e.step(&state, &open(), &rest());
        assert_eq!(state.mode, RoverMode::Stop);
        assert_eq!(state.blind_ticks, 0);
        assert_eq!(state.command, ActuationCommand::braking(p.brake_setting));
    }

    #[test]
    fn failsafe_preempts_every_active_mode() {
        let e = engine(DecisionProfile::default());
        for mode in RoverMode::ALL {
            let next = e.step(&RoverState::in_mode(mode), &blind(), &rest());
            let expected = if mode == RoverMode::Finished {
                RoverMode::Finished
            } else {
                RoverMode::Failsafe
            };
            assert_eq!(next.mode, expected, "from {mode}");
        }
    }

    #[test]
    fn failsafe_brakes_residual_motion() {
        let p = DecisionProfile::default();
        let next = engine(p).step(&RoverState::in_mode(RoverMode::Failsafe), &blind(), &moving(1.2));
        assert_eq!(next.mode, RoverMode::Failsafe);
        assert_eq!(next.command, ActuationCommand::braking(p.brake_setting));
    }

    #[test]
    fn failsafe_exits_even_while_moving() {
        let next = engine(DecisionProfile::default()).step(
            &RoverState::in_mode(RoverMode::Failsafe),
            &open(),
            &moving(1.2),
        );
        assert_eq!(next.mode, RoverMode::Stop);
    }

    // ── Cross-cutting ────────────────────────────────────────────────────────

    #[test]
    fn pickup_trigger_truth_table() {
        let e = engine(DecisionProfile::default());
        for near_sample in [false, true] {
            for velocity in [0.0, 0.4] {
                for picking_up in [false, true] {
                    let t = Telemetry {
                        near_sample,
                        picking_up,
                        ..moving(velocity)
                    };
                    let next = e.step(&RoverState::in_mode(RoverMode::Stop), &open(), &t);
                    let expected = near_sample && velocity == 0.0 && !picking_up;
                    assert_eq!(
                        next.send_pickup, expected,
                        "near={near_sample} v={velocity} picking={picking_up}"
                    );
                }
            }
        }
    }

    #[test]
    fn pickup_needs_exact_standstill_even_with_stationary_tolerance() {
        let profile = DecisionProfile {
            stationary_velocity: 0.3,
            ..DecisionProfile::default()
        };
        let e = engine(profile);
        let rolling = Telemetry {
            near_sample: true,
            ..moving(0.25)
        };
        let next = e.step(&RoverState::in_mode(RoverMode::Stop), &open(), &rolling);
        assert!(!next.send_pickup);

        let halted = Telemetry {
            near_sample: true,
            ..rest()
        };
        let next = e.step(&RoverState::in_mode(RoverMode::Stop), &open(), &halted);
        assert!(next.send_pickup);
    }

    #[test]
    fn commands_stay_bounded_in_every_mode() {
        for profile in [DecisionProfile::conservative(), DecisionProfile::aggressive()] {
            let e = engine(profile);
            let mut rock = with_camera(open(), visible(-40.0, false));
            rock.rock.nearby = true;
            let mut cluttered = open();
            cluttered.classified.obstacle.fill_rect(110..152, 140..180);
            let summaries = [open(), close(), blind(), rock, cluttered];

            for mode in RoverMode::ALL {
                for s in &summaries {
                    for velocity in [-1.0, 0.0, 0.3, 5.0] {
                        for near_sample in [false, true] {
                            let mut t = moving(velocity);
                            t.near_sample = near_sample;
                            t.start_x = 10.0;
                            let c = e.step(&RoverState::in_mode(mode), s, &t).command;
                            assert!(c.steer.is_finite() && c.steer.abs() <= 15.0, "{mode}: {c:?}");
                            assert!((0.0..=1.0).contains(&c.throttle), "{mode}: {c:?}");
                            assert!(c.brake >= 0.0, "{mode}: {c:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn sanitize_replaces_non_finite_values() {
        let e = engine(DecisionProfile::default());
        let c = e.sanitize(ActuationCommand::new(f32::NAN, -3.0, 40.0));
        assert_eq!(c, ActuationCommand::new(0.0, 0.0, 15.0));
        let c = e.sanitize(ActuationCommand::new(4.0, f32::INFINITY, f32::NEG_INFINITY));
        assert_eq!(c, ActuationCommand::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn ticks_in_mode_counts_and_resets() {
        let e = engine(DecisionProfile::default());
        let mut state = RoverState::default();
        for expected in 1..=3 {
            state = e.step(&state, &open(), &rest());
            assert_eq!(state.ticks_in_mode, expected);
        }
        state = e.step(&state, &close(), &rest());
        assert_eq!(state.mode, RoverMode::Stop);
        assert_eq!(state.ticks_in_mode, 0);
    }

    #[test]
    fn step_is_deterministic() {
        let e = engine(DecisionProfile::aggressive());
        let state = RoverState::in_mode(RoverMode::Stop);
        let a = e.step(&state, &open(), &rest());
        let b = e.step(&state, &open(), &rest());
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_profile_is_rejected_at_construction() {
        let p = DecisionProfile {
            steer_limit: 0.0,
            ..DecisionProfile::default()
        };
        assert!(DecisionEngine::new(p, 320, 160).is_err());
    }
}
