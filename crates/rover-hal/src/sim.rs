//! Scripted in-process drivers for headless testing.
//!
//! [`SimCamera`] and [`SimTelemetryLink`] replay a fixed script, repeating
//! the last entry once the script is exhausted. [`SimDriveTrain`] records
//! every command and pickup request so tests can assert on them.
//!
//! # Example
//!
//! ```rust
//! use rover_hal::sim::{SimCamera, SimDriveTrain};
//! use rover_hal::{Camera, DriveTrain};
//! use rover_types::{ActuationCommand, Frame};
//!
//! let mut camera = SimCamera::new("front_rgb", vec![Frame::black(320, 160)]);
//! assert_eq!(camera.capture().unwrap().width, 320);
//!
//! let mut drive = SimDriveTrain::new("sim_drive");
//! drive.apply(&ActuationCommand::braking(1.0)).unwrap();
//! assert_eq!(drive.commands().len(), 1);
//! ```

use rover_types::{ActuationCommand, Frame, RoverError, Telemetry};
use tracing::debug;

use crate::camera::Camera;
use crate::drive::DriveTrain;
use crate::link::TelemetryLink;

// ────────────────────────────────────────────────────────────────────────────
// Script replay
// ────────────────────────────────────────────────────────────────────────────

/// Hands out the entries of a script in order, then repeats the last one.
#[derive(Debug, Clone)]
struct Script<T> {
    items: Vec<T>,
    next: usize,
}

impl<T: Clone> Script<T> {
    fn new(items: Vec<T>) -> Self {
        Self { items, next: 0 }
    }

    fn next(&mut self) -> Option<T> {
        let i = self.next.min(self.items.len().checked_sub(1)?);
        self.next = self.next.saturating_add(1);
        self.items.get(i).cloned()
    }
}

fn exhausted(component: &str, what: &str) -> RoverError {
    RoverError::Hardware {
        component: component.to_string(),
        details: format!("no {what} scripted"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera replaying scripted frames.
pub struct SimCamera {
    id: String,
    frames: Script<Frame>,
}

impl SimCamera {
    pub fn new(id: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            id: id.into(),
            frames: Script::new(frames),
        }
    }

    /// A camera that fails every capture.
    pub fn disconnected(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new())
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<Frame, RoverError> {
        self.frames.next().ok_or_else(|| exhausted(&self.id, "frame"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Telemetry
// ────────────────────────────────────────────────────────────────────────────

/// A simulated telemetry feed replaying scripted records.
pub struct SimTelemetryLink {
    id: String,
    records: Script<Telemetry>,
}

impl SimTelemetryLink {
    pub fn new(id: impl Into<String>, records: Vec<Telemetry>) -> Self {
        Self {
            id: id.into(),
            records: Script::new(records),
        }
    }
}

impl TelemetryLink for SimTelemetryLink {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self) -> Result<Telemetry, RoverError> {
        self.records.next().ok_or_else(|| exhausted(&self.id, "telemetry"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Drive train
// ────────────────────────────────────────────────────────────────────────────

/// A simulated drive train that records everything it is asked to do.
/// Always succeeds.
#[derive(Debug, Default)]
pub struct SimDriveTrain {
    id: String,
    commands: Vec<ActuationCommand>,
    pickups: usize,
}

impl SimDriveTrain {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Every command applied so far, oldest first.
    pub fn commands(&self) -> &[ActuationCommand] {
        &self.commands
    }

    pub fn last_command(&self) -> Option<&ActuationCommand> {
        self.commands.last()
    }

    /// Number of pickup requests received.
    pub fn pickups(&self) -> usize {
        self.pickups
    }
}

impl DriveTrain for SimDriveTrain {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, command: &ActuationCommand) -> Result<(), RoverError> {
        debug!(drive = %self.id, ?command, "sim drive command");
        self.commands.push(*command);
        Ok(())
    }

    fn request_pickup(&mut self) -> Result<(), RoverError> {
        debug!(drive = %self.id, "sim pickup request");
        self.pickups += 1;
        Ok(())
    }
}
