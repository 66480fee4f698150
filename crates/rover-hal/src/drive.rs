//! Generic `DriveTrain` trait: where actuation commands and pickup requests
//! end up.
//!
//! The command has already been clamped by the decision engine; drivers do
//! not need to re-check bounds.

use rover_types::{ActuationCommand, RoverError};

/// Throttle, brake and steering plus the sample-pickup arm.
pub trait DriveTrain: Send {
    fn id(&self) -> &str;

    /// Apply one tick's command.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Hardware`] if the command cannot be applied.
    fn apply(&mut self, command: &ActuationCommand) -> Result<(), RoverError>;

    /// Ask the platform to pick up the adjacent sample.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Hardware`] if the request cannot be delivered.
    fn request_pickup(&mut self) -> Result<(), RoverError>;
}
