//! Generic `TelemetryLink` trait for the vehicle state feed.

use rover_types::{RoverError, Telemetry};

/// The channel that delivers one [`Telemetry`] record per control tick.
pub trait TelemetryLink: Send {
    fn id(&self) -> &str;

    /// Read the record for the current tick.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Hardware`] if no record is available.
    fn read(&mut self) -> Result<Telemetry, RoverError>;
}
