//! [`RoverController`] – the per-tick driver.
//!
//! Owns everything that lives for a mission (the world map, the decision
//! state, the latest display overlay) and runs one perception → decision
//! pass per call:
//!
//! ```text
//! Camera ──► Frame ─┐
//!                   ├─► PerceptionPipeline ──► PerceptionSummary ──► DecisionEngine ──► TickOutput ──► DriveTrain
//! TelemetryLink ────┘          │                                          │
//!                              ▼                                          ▼
//!                          WorldMap                                  RoverState
//! ```
//!
//! A tick either completes or leaves the controller exactly as it was: all
//! input validation happens before the world map or state is touched.
//!
//! # Example
//!
//! ```rust
//! use rover_runtime::{RoverConfig, RoverController};
//! use rover_types::{Frame, RoverMode, Telemetry};
//!
//! let mut rover = RoverController::new(RoverConfig::default()).unwrap();
//!
//! let mut frame = Frame::black(320, 160);
//! frame.fill_rect(80..160, 0..320, [200, 200, 200]);
//!
//! let out = rover.tick(&frame, &Telemetry::at_rest(100.0, 100.0, 0.0)).unwrap();
//! assert_eq!(out.mode, RoverMode::Forward);
//! assert!(out.command.throttle > 0.0);
//! ```

use rover_decision::{DecisionEngine, RoverState};
use rover_hal::{Camera, DriveTrain, TelemetryLink};
use rover_perception::{PerceptionPipeline, WorldMap};
use rover_types::{Frame, RoverError, Telemetry, TickOutput};
use tracing::{debug, info, info_span};

use crate::config::RoverConfig;

/// Runs the perception and decision stages once per external tick.
pub struct RoverController {
    config: RoverConfig,
    pipeline: PerceptionPipeline,
    engine: DecisionEngine,
    map: WorldMap,
    state: RoverState,
    overlay: Frame,
    ticks: u64,
}

impl RoverController {
    /// Validate `config` and prepare a fresh mission.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidConfig`] when the configuration is rejected.
    /// No tick can run on an invalid configuration.
    pub fn new(config: RoverConfig) -> Result<Self, RoverError> {
        let (pipeline, engine) = config.build_stages()?;
        let (width, height) = (config.frame_width, config.frame_height);
        let map = pipeline.new_world_map();

        info!(
            width,
            height,
            world_size = config.perception.world.size,
            avoidance = ?config.decision.avoidance,
            "rover controller ready"
        );
        Ok(Self {
            config,
            pipeline,
            engine,
            map,
            state: RoverState::default(),
            overlay: Frame::black(width, height),
            ticks: 0,
        })
    }

    /// Run one tick on an already acquired frame and telemetry record.
    ///
    /// # Errors
    ///
    /// [`RoverError::FrameSize`], [`RoverError::FrameData`] or
    /// [`RoverError::InvalidTelemetry`] for malformed input. The world map
    /// and decision state are left untouched.
    pub fn tick(&mut self, frame: &Frame, telemetry: &Telemetry) -> Result<TickOutput, RoverError> {
        let span = info_span!("rover_tick", tick = self.ticks, mode = %self.state.mode);
        let _enter = span.enter();

        let summary = self.pipeline.process(frame, telemetry, &mut self.map)?;
        let next = self.engine.step(&self.state, &summary, telemetry);

        self.overlay = summary.classified.to_overlay();
        self.state = next;
        self.ticks += 1;

        debug!(
            mode = %next.mode,
            throttle = next.command.throttle,
            brake = next.command.brake,
            steer = next.command.steer,
            send_pickup = next.send_pickup,
            "tick complete"
        );
        Ok(next.output())
    }

    /// Read one frame and one telemetry record, run a tick, and hand the
    /// result to the drive train.
    ///
    /// # Errors
    ///
    /// Any collaborator failure ([`RoverError::Hardware`]) or tick failure.
    /// Nothing is sent to `drive` when the tick fails.
    pub fn drive_once(
        &mut self,
        camera: &mut (impl Camera + ?Sized),
        link: &mut (impl TelemetryLink + ?Sized),
        drive: &mut (impl DriveTrain + ?Sized),
    ) -> Result<TickOutput, RoverError> {
        let frame = camera.capture()?;
        let telemetry = link.read()?;
        let out = self.tick(&frame, &telemetry)?;

        drive.apply(&out.command)?;
        if out.send_pickup {
            info!(drive = drive.id(), "requesting sample pickup");
            drive.request_pickup()?;
        }
        Ok(out)
    }

    /// Start a new mission: empty world map, initial decision state.
    pub fn reset_mission(&mut self) {
        info!(ticks = self.ticks, coverage = self.map.navigable_coverage(), "mission reset");
        self.map.reset();
        self.state = RoverState::default();
        self.overlay = Frame::black(self.config.frame_width, self.config.frame_height);
        self.ticks = 0;
    }

    pub fn config(&self) -> &RoverConfig {
        &self.config
    }

    pub fn world_map(&self) -> &WorldMap {
        &self.map
    }

    pub fn state(&self) -> &RoverState {
        &self.state
    }

    /// The latest classification overlay (R = obstacle, G = rock,
    /// B = navigable) for display.
    pub fn overlay(&self) -> &Frame {
        &self.overlay
    }

    /// Ticks completed in this mission.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
