//! `rover-perception` – turns a forward camera frame into terrain knowledge.
//!
//! # Modules
//!
//! - [`rectify`] – [`Rectifier`][rectify::Rectifier]: perspective warp of the
//!   forward camera into a top-down ground view, from a fixed four-point
//!   calibration.
//! - [`classify`] – colour thresholding into navigable / obstacle / rock
//!   [`Mask`][classify::Mask]s.
//! - [`transform`] – pixel → rover-frame → world-cell coordinate math.
//! - [`world_map`] – [`WorldMap`][world_map::WorldMap]: the mission-lifetime
//!   occupancy accumulator.
//! - [`rock`] – [`RockLocator`][rock::RockLocator]: top-down and forward
//!   camera rock detection.
//! - [`pipeline`] – [`PerceptionPipeline`][pipeline::PerceptionPipeline]:
//!   runs all of the above once per tick and produces a
//!   [`PerceptionSummary`][pipeline::PerceptionSummary].

pub mod classify;
pub mod pipeline;
pub mod rectify;
pub mod rock;
pub mod transform;
pub mod world_map;

pub use pipeline::{PerceptionConfig, PerceptionPipeline, PerceptionSummary};
pub use world_map::{MapChannel, WorldMap};
