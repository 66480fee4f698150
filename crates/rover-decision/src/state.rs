//! The decision engine's state between ticks.

use rover_types::{ActuationCommand, RoverMode, TickOutput};
use serde::{Deserialize, Serialize};

/// Everything the decision engine carries from one tick to the next.
///
/// Owned by the control loop; [`DecisionEngine::step`][crate::engine::DecisionEngine::step]
/// takes it by reference and returns its successor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RoverState {
    pub mode: RoverMode,
    /// The command decided on the last tick.
    pub command: ActuationCommand,
    /// Set on the tick a pickup should be requested.
    pub send_pickup: bool,
    /// Completed ticks spent in `mode`; zero on the tick a mode is entered.
    pub ticks_in_mode: u32,
    /// Consecutive ticks without a navigable bearing.
    pub blind_ticks: u32,
}

impl RoverState {
    /// A state already in `mode`, for tests and mission resumption.
    pub fn in_mode(mode: RoverMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn output(&self) -> TickOutput {
        TickOutput {
            command: self.command,
            mode: self.mode,
            send_pickup: self.send_pickup,
        }
    }
}
