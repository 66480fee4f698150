//! # rover-runtime
//!
//! Mission-level wiring for the rover: loads the [`RoverConfig`], owns the
//! per-mission state in a [`RoverController`], and sets up `tracing`.
//!
//! Each external tick feeds one camera frame and one telemetry record through
//! perception and decision and yields a [`TickOutput`](rover_types::TickOutput).
//! The caller drives the loop; nothing here spawns threads or blocks on I/O
//! except through the [`rover_hal`] collaborators passed to
//! [`RoverController::drive_once`].

pub mod config;
pub mod controller;
pub mod telemetry;

pub use config::RoverConfig;
pub use controller::RoverController;
