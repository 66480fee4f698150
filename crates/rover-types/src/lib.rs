//! `rover-types` – shared vocabulary for the rover control core.
//!
//! Every other crate in the workspace speaks in these types: the camera
//! [`Frame`], the per-tick [`Telemetry`] snapshot, the discrete
//! [`RoverMode`], the [`ActuationCommand`] handed to the drive train, and the
//! [`RoverError`] taxonomy.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Frame
// ────────────────────────────────────────────────────────────────────────────

/// A row-major RGB24 image buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel data, three bytes per pixel.
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap an existing RGB24 buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::FrameData`] when `data` does not hold exactly
    /// `width * height * 3` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RoverError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(RoverError::FrameData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame where every pixel has the colour `rgb`.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// An all-black frame.
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn rows(&self) -> usize {
        self.height as usize
    }

    pub fn cols(&self) -> usize {
        self.width as usize
    }

    /// Read the pixel at (`row`, `col`).
    ///
    /// Panics if the coordinate is outside the frame.
    pub fn pixel(&self, row: usize, col: usize) -> [u8; 3] {
        let i = (row * self.cols() + col) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Overwrite the pixel at (`row`, `col`).
    pub fn set_pixel(&mut self, row: usize, col: usize, rgb: [u8; 3]) {
        let i = (row * self.cols() + col) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Paint a rectangle; the ranges are clipped to the frame.
    pub fn fill_rect(&mut self, rows: Range<usize>, cols: Range<usize>, rgb: [u8; 3]) {
        let row_end = rows.end.min(self.rows());
        let col_end = cols.end.min(self.cols());
        for row in rows.start..row_end {
            for col in cols.start..col_end {
                self.set_pixel(row, col, rgb);
            }
        }
    }

    /// Check that the frame has exactly the expected geometry and a buffer
    /// that matches it.
    ///
    /// # Errors
    ///
    /// [`RoverError::FrameSize`] on a dimension mismatch,
    /// [`RoverError::FrameData`] on a truncated or oversized buffer.
    pub fn check_geometry(&self, width: u32, height: u32) -> Result<(), RoverError> {
        if self.width != width || self.height != height {
            return Err(RoverError::FrameSize {
                expected_width: width,
                expected_height: height,
                width: self.width,
                height: self.height,
            });
        }
        let expected = width as usize * height as usize * 3;
        if self.data.len() != expected {
            return Err(RoverError::FrameData {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Telemetry
// ────────────────────────────────────────────────────────────────────────────

/// Vehicle pose as reported by the platform. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// World X position (world-map cells).
    pub x: f32,
    /// World Y position (world-map cells).
    pub y: f32,
    pub yaw_deg: f32,
    pub roll_deg: f32,
    pub pitch_deg: f32,
}

/// One telemetry record, delivered once per control tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub pose: Pose,
    /// Forward speed; negative while rolling backwards.
    pub velocity: f32,
    /// The platform reports a sample within pickup reach.
    pub near_sample: bool,
    /// A pickup is currently in progress.
    pub picking_up: bool,
    /// Mission start position (world-map cells).
    pub start_x: f32,
    pub start_y: f32,
    /// Mission criteria met; the rover should return to its start position.
    #[serde(default)]
    pub return_home: bool,
}

impl Telemetry {
    /// A level, stationary rover at `(x, y)` that started at the same spot.
    pub fn at_rest(x: f32, y: f32, yaw_deg: f32) -> Self {
        Self {
            pose: Pose {
                x,
                y,
                yaw_deg,
                roll_deg: 0.0,
                pitch_deg: 0.0,
            },
            velocity: 0.0,
            near_sample: false,
            picking_up: false,
            start_x: x,
            start_y: y,
            return_home: false,
        }
    }

    /// Reject records carrying NaN or infinite values.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidTelemetry`] naming the first offending field.
    pub fn validate(&self) -> Result<(), RoverError> {
        let fields = [
            ("x", self.pose.x),
            ("y", self.pose.y),
            ("yaw", self.pose.yaw_deg),
            ("roll", self.pose.roll_deg),
            ("pitch", self.pose.pitch_deg),
            ("velocity", self.velocity),
            ("start_x", self.start_x),
            ("start_y", self.start_y),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(RoverError::InvalidTelemetry {
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Straight-line distance from the current position to the start.
    pub fn distance_to_start(&self) -> f32 {
        (self.pose.x - self.start_x).hypot(self.pose.y - self.start_y)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mode and actuation
// ────────────────────────────────────────────────────────────────────────────

/// Discrete navigation mode of the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoverMode {
    #[default]
    Forward,
    Stop,
    InitRockStop,
    RockCrawl,
    DirectHome,
    GoHome,
    Finished,
    Failsafe,
}

impl RoverMode {
    /// Every mode, in declaration order.
    pub const ALL: [RoverMode; 8] = [
        RoverMode::Forward,
        RoverMode::Stop,
        RoverMode::InitRockStop,
        RoverMode::RockCrawl,
        RoverMode::DirectHome,
        RoverMode::GoHome,
        RoverMode::Finished,
        RoverMode::Failsafe,
    ];

    /// `true` for modes with no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, RoverMode::Finished)
    }
}

impl fmt::Display for RoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoverMode::Forward => "forward",
            RoverMode::Stop => "stop",
            RoverMode::InitRockStop => "init_rock_stop",
            RoverMode::RockCrawl => "rock_crawl",
            RoverMode::DirectHome => "direct_home",
            RoverMode::GoHome => "go_home",
            RoverMode::Finished => "finished",
            RoverMode::Failsafe => "failsafe",
        };
        f.write_str(name)
    }
}

/// Throttle / brake / steer demand for one tick. Steer is in degrees,
/// positive to the left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActuationCommand {
    pub throttle: f32,
    pub brake: f32,
    pub steer: f32,
}

impl ActuationCommand {
    pub fn new(throttle: f32, brake: f32, steer: f32) -> Self {
        Self {
            throttle,
            brake,
            steer,
        }
    }

    /// Zero throttle and steer with the given brake magnitude.
    pub fn braking(brake: f32) -> Self {
        Self::new(0.0, brake, 0.0)
    }

    /// Brakes released, zero throttle, wheels turned to `steer`.
    pub fn turn_in_place(steer: f32) -> Self {
        Self::new(0.0, 0.0, steer)
    }
}

/// Everything the core hands back to the platform after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickOutput {
    pub command: ActuationCommand,
    pub mode: RoverMode,
    pub send_pickup: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type for the whole control core.
///
/// Perception degradation (no navigable terrain, no rock in view) is *not*
/// represented here; the decision engine handles it as ordinary state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoverError {
    #[error(
        "Frame is {width}x{height}, expected {expected_width}x{expected_height}"
    )]
    FrameSize {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    FrameData { expected: usize, actual: usize },

    #[error("Telemetry field `{field}` is not finite: {value}")]
    InvalidTelemetry { field: String, value: f32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration I/O error: {0}")]
    ConfigIo(String),

    #[error("Hardware fault on {component}: {details}")]
    Hardware { component: String, details: String },
}
