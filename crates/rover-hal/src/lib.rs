//! `rover-hal` – boundary traits for the rover's external collaborators.
//!
//! The control core never talks to a simulator or vehicle directly; it
//! reads frames through a [`Camera`], telemetry through a
//! [`TelemetryLink`], and hands its decisions to a [`DriveTrain`]. Drivers
//! can be swapped without touching perception or decision logic.
//!
//! [`sim`] provides scripted in-process drivers for tests.

pub mod camera;
pub mod drive;
pub mod link;
pub mod sim;

pub use camera::Camera;
pub use drive::DriveTrain;
pub use link::TelemetryLink;
