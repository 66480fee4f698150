//! Generic `Camera` trait for the forward-facing image source.

use rover_types::{Frame, RoverError};

/// A forward-facing camera.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"front_rgb"`.
    fn id(&self) -> &str;

    /// Capture and return the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Hardware`] if the frame cannot be captured
    /// (e.g. the device is disconnected or the stream has ended).
    fn capture(&mut self) -> Result<Frame, RoverError>;
}
