//! `rover-decision` – the navigation state machine.
//!
//! # Modules
//!
//! - [`profile`] – [`DecisionProfile`]: thresholds, steering constants and
//!   the obstacle windows, with `conservative` and `aggressive` presets.
//! - [`cues`] – [`Cues`][cues::Cues]: the per-tick booleans and bearings the
//!   state machine branches on.
//! - [`state`] – [`RoverState`]: what carries over from one tick to the next.
//! - [`engine`] – [`DecisionEngine`]: the mode transition and actuation
//!   policy.

pub mod cues;
pub mod engine;
pub mod profile;
pub mod state;

pub use engine::DecisionEngine;
pub use profile::{AvoidanceStrategy, DecisionProfile, ObstacleWindow, ObstacleWindows, ProfileKind};
pub use state::RoverState;
