//! Perspective rectification of the forward camera into a top-down view.
//!
//! A fixed calibration pairs four points on the ground in the camera image
//! with four points of a small square just in front of the rover in the
//! top-down view. The [`Homography`] solved from those pairs is inverted
//! once; [`Rectifier::rectify`] then pulls every output pixel from the
//! camera frame with bilinear sampling. Output pixels whose source falls
//! outside the camera frame stay true-black, which is what lets the
//! classifier tell the unrectified border apart from dark obstacles.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::rectify::{Calibration, Rectifier};
//! use rover_types::Frame;
//!
//! let rectifier = Rectifier::new(&Calibration::default(), 320, 160).unwrap();
//! let top_down = rectifier.rectify(&Frame::filled(320, 160, [200, 200, 200])).unwrap();
//!
//! // Rows past the ground limit are always blanked.
//! assert_eq!(top_down.pixel(155, 160), [0, 0, 0]);
//! ```

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use rover_types::{Frame, RoverError};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Calibration
// ────────────────────────────────────────────────────────────────────────────

/// Fixed camera-to-ground calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Four `(col, row)` points of a 1 m grid square in the camera image:
    /// bottom-left, bottom-right, top-right, top-left.
    pub source: [[f32; 2]; 4],
    /// Half the side of the destination square, in top-down pixels.
    pub destination_half_size: f32,
    /// Gap between the bottom of the top-down frame and the square.
    pub bottom_offset: f32,
    /// First row of the top-down frame that is past the visible ground;
    /// it and every row below it are blanked.
    pub horizon_row: u32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            source: [[15.0, 140.0], [301.0, 140.0], [200.0, 96.0], [119.0, 96.0]],
            destination_half_size: 5.0,
            bottom_offset: 9.0,
            horizon_row: 152,
        }
    }
}

impl Calibration {
    /// Destination square for a `width` × `height` frame, in the same corner
    /// order as [`source`][Self::source].
    pub fn destination(&self, width: u32, height: u32) -> [[f32; 2]; 4] {
        let cx = width as f32 / 2.0;
        let h = height as f32;
        let s = self.destination_half_size;
        let b = self.bottom_offset;
        [
            [cx - s, h - b - 1.0],
            [cx + s - 1.0, h - b - 1.0],
            [cx + s - 1.0, h - 2.0 * s - b],
            [cx - s, h - 2.0 * s - b],
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Homography
// ────────────────────────────────────────────────────────────────────────────

/// A planar projective transform acting on `(x = col, y = row)` points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Solve the homography mapping each `src[i]` onto `dst[i]`.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidConfig`] when the point sets are degenerate
    /// (three collinear points, repeated points) and no unique transform
    /// exists.
    pub fn from_point_pairs(src: &[[f32; 2]; 4], dst: &[[f32; 2]; 4]) -> Result<Self, RoverError> {
        // Standard 8-unknown DLT with h33 fixed to 1.
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let (x, y) = (f64::from(s[0]), f64::from(s[1]));
            let (u, v) = (f64::from(d[0]), f64::from(d[1]));
            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;
            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        if a.determinant().abs() < 1e-9 {
            return Err(degenerate());
        }
        let h = a.lu().solve(&b).ok_or_else(degenerate)?;
        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        if !matrix.iter().all(|v| v.is_finite()) || matrix.determinant().abs() < 1e-12 {
            return Err(degenerate());
        }
        Ok(Self { matrix })
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Result<Self, RoverError> {
        self.matrix
            .try_inverse()
            .map(|matrix| Self { matrix })
            .ok_or_else(degenerate)
    }

    /// Map a point. Returns `None` for points sent to infinity (on the
    /// vanishing line).
    pub fn apply(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let p = self.matrix * Vector3::new(f64::from(x), f64::from(y), 1.0);
        if p.z.abs() < 1e-12 {
            return None;
        }
        Some(((p.x / p.z) as f32, (p.y / p.z) as f32))
    }
}

fn degenerate() -> RoverError {
    RoverError::InvalidConfig("rectification calibration points are degenerate".to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Rectifier
// ────────────────────────────────────────────────────────────────────────────

/// Warps camera frames of one fixed geometry into the top-down view.
#[derive(Debug, Clone)]
pub struct Rectifier {
    /// Top-down pixel → camera pixel.
    inverse: Homography,
    width: u32,
    height: u32,
    horizon_row: u32,
}

impl Rectifier {
    /// Prepare a rectifier for `width` × `height` frames.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidConfig`] for a degenerate calibration or a
    /// horizon row beyond the frame.
    pub fn new(calibration: &Calibration, width: u32, height: u32) -> Result<Self, RoverError> {
        if calibration.horizon_row > height {
            return Err(RoverError::InvalidConfig(format!(
                "horizon row {} is beyond the frame height {height}",
                calibration.horizon_row
            )));
        }
        let forward =
            Homography::from_point_pairs(&calibration.source, &calibration.destination(width, height))?;
        Ok(Self {
            inverse: forward.inverse()?,
            width,
            height,
            horizon_row: calibration.horizon_row,
        })
    }

    /// Warp `frame` into the top-down view and blank the rows past the
    /// visible ground.
    ///
    /// # Errors
    ///
    /// [`RoverError::FrameSize`] / [`RoverError::FrameData`] when the frame
    /// does not have the geometry this rectifier was calibrated for.
    pub fn rectify(&self, frame: &Frame) -> Result<Frame, RoverError> {
        frame.check_geometry(self.width, self.height)?;

        let mut out = Frame::black(self.width, self.height);
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        for row in 0..self.horizon_row as usize {
            for col in 0..self.width as usize {
                let Some((x, y)) = self.inverse.apply(col as f32, row as f32) else {
                    continue;
                };
                if !(0.0..=max_x).contains(&x) || !(0.0..=max_y).contains(&y) {
                    continue;
                }
                out.set_pixel(row, col, sample_bilinear(frame, x, y));
            }
        }
        Ok(out)
    }
}

fn sample_bilinear(frame: &Frame, x: f32, y: f32) -> [u8; 3] {
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(frame.cols() - 1);
    let y1 = (y0 + 1).min(frame.rows() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = frame.pixel(y0, x0);
    let p01 = frame.pixel(y0, x1);
    let p10 = frame.pixel(y1, x0);
    let p11 = frame.pixel(y1, x1);

    let mut out = [0u8; 3];
    for ch in 0..3 {
        let top = f32::from(p00[ch]) * (1.0 - fx) + f32::from(p01[ch]) * fx;
        let bottom = f32::from(p10[ch]) * (1.0 - fx) + f32::from(p11[ch]) * fx;
        out[ch] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
