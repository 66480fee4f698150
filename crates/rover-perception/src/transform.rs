//! Coordinate transforms between the image, rover and world frames.
//!
//! Three frames are in play:
//!
//! - **Pixel** – (`row`, `col`) in the rectified top-down frame, origin at the
//!   top-left corner.
//! - **Rover** – Cartesian, origin at the bottom-centre of the frame, `x`
//!   pointing forward and `y` pointing left.
//! - **World** – the fixed mission grid the [`WorldMap`][crate::world_map::WorldMap]
//!   accumulates into. Rover-frame pixels are rotated by the vehicle yaw,
//!   scaled down and translated by the vehicle position.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::transform::{pixel_to_rover_frame, to_polar};
//!
//! // The pixel straight ahead of the rover, ten rows up from the bottom.
//! let (x, y) = pixel_to_rover_frame(150, 160, 160, 320);
//! assert_eq!((x, y), (10.0, 0.0));
//!
//! let (dist, angle) = to_polar(x, y);
//! assert!((dist - 10.0).abs() < 1e-6);
//! assert!(angle.abs() < 1e-6);
//! ```

// ────────────────────────────────────────────────────────────────────────────
// Pixel ↔ rover
// ────────────────────────────────────────────────────────────────────────────

/// Convert a pixel of a `frame_height` × `frame_width` top-down frame into
/// rover-centric Cartesian coordinates.
pub fn pixel_to_rover_frame(
    pixel_row: usize,
    pixel_col: usize,
    frame_height: usize,
    frame_width: usize,
) -> (f32, f32) {
    let x = frame_height as f32 - pixel_row as f32;
    let y = frame_width as f32 / 2.0 - pixel_col as f32;
    (x, y)
}

/// Rover-centric Cartesian → polar: `(distance, angle)` with the angle in
/// radians, measured from the forward axis, positive to the left.
pub fn to_polar(x: f32, y: f32) -> (f32, f32) {
    (x.hypot(y), y.atan2(x))
}

// ────────────────────────────────────────────────────────────────────────────
// Rover ↔ world
// ────────────────────────────────────────────────────────────────────────────

/// Rotate a rover-frame point by `yaw_deg` (counter-clockwise).
pub fn rotate(x: f32, y: f32, yaw_deg: f32) -> (f32, f32) {
    let (sin, cos) = yaw_deg.to_radians().sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

/// Map a rover-frame point into a world-map cell.
///
/// The point is rotated by `yaw_deg`, divided by `scale` (rover pixels per
/// world cell) and translated by the vehicle position. The result is
/// truncated toward zero and saturated into `[0, world_size - 1]` on each
/// axis. Points that fall off the map pile up on its edge instead of
/// wrapping around.
///
/// Returns `(world_x, world_y)`.
pub fn rotate_and_translate(
    x: f32,
    y: f32,
    yaw_deg: f32,
    world_x: f32,
    world_y: f32,
    scale: f32,
    world_size: usize,
) -> (usize, usize) {
    let (xr, yr) = rotate(x, y, yaw_deg);
    let xt = xr / scale + world_x;
    let yt = yr / scale + world_y;
    (saturate(xt, world_size), saturate(yt, world_size))
}

/// Express a world-frame target relative to the rover: `dx` ahead, `dy` to
/// the left.
pub fn rover_centric_offset(
    target_world_x: f32,
    target_world_y: f32,
    rover_world_x: f32,
    rover_world_y: f32,
    yaw_deg: f32,
) -> (f32, f32) {
    let tx = target_world_x - rover_world_x;
    let ty = target_world_y - rover_world_y;
    let (sin, cos) = yaw_deg.to_radians().sin_cos();
    (tx * cos + ty * sin, -tx * sin + ty * cos)
}

fn saturate(value: f32, world_size: usize) -> usize {
    let max = world_size.saturating_sub(1);
    // `as` saturates negatives (and NaN) to zero.
    (value.trunc().max(0.0) as usize).min(max)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
