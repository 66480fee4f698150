//! Mission-lifetime world map.
//!
//! A square grid of `size × size` cells with three independent hit counters
//! per cell (obstacle, rock, navigable). Counters only ever grow; the only
//! way back to zero is [`WorldMap::reset`] at the start of a new mission.
//!
//! Updates come exclusively from the perception pipeline and only while the
//! vehicle is near-level (see [`is_near_level`]): a tilted camera projects
//! the ground to the wrong place and would smear the map.

use serde::{Deserialize, Serialize};

/// Largest accepted `size`. Three `u32` channels at this size already take
/// 192 MiB.
pub const MAX_WORLD_SIZE: usize = 4096;

/// World grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldGeometry {
    /// Cells per side.
    pub size: usize,
    /// Rover-frame pixels per world cell.
    pub scale: f32,
}

impl Default for WorldGeometry {
    fn default() -> Self {
        Self {
            size: 200,
            scale: 10.0,
        }
    }
}

/// One of the three counters stored per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapChannel {
    Obstacle,
    Rock,
    Navigable,
}

/// Per-mission occupancy accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldMap {
    size: usize,
    obstacle: Vec<u32>,
    rock: Vec<u32>,
    navigable: Vec<u32>,
}

impl WorldMap {
    /// An empty `size × size` map.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            obstacle: vec![0; size * size],
            rock: vec![0; size * size],
            navigable: vec![0; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Hit count of `channel` at world cell (`x`, `y`).
    pub fn get(&self, channel: MapChannel, x: usize, y: usize) -> u32 {
        self.channel(channel)[y * self.size + x]
    }

    /// Sum of all counters of one channel.
    pub fn total(&self, channel: MapChannel) -> u64 {
        self.channel(channel).iter().map(|c| u64::from(*c)).sum()
    }

    /// Number of cells seen as navigable at least once.
    pub fn navigable_coverage(&self) -> usize {
        self.navigable.iter().filter(|c| **c > 0).count()
    }

    /// Zero every counter (new mission).
    pub fn reset(&mut self) {
        self.obstacle.fill(0);
        self.rock.fill(0);
        self.navigable.fill(0);
    }

    /// Increment `channel` once for every distinct `(x, y)` cell in `cells`,
    /// however many times a cell repeats. Returns the number of cells
    /// touched.
    pub(crate) fn mark_cells(
        &mut self,
        channel: MapChannel,
        cells: impl IntoIterator<Item = (usize, usize)>,
    ) -> usize {
        let size = self.size;
        let mut indices: Vec<usize> = cells
            .into_iter()
            .filter(|(x, y)| *x < size && *y < size)
            .map(|(x, y)| y * size + x)
            .collect();
        indices.sort_unstable();
        indices.dedup();

        let counters = self.channel_mut(channel);
        for &i in &indices {
            counters[i] = counters[i].saturating_add(1);
        }
        indices.len()
    }

    fn channel(&self, channel: MapChannel) -> &[u32] {
        match channel {
            MapChannel::Obstacle => &self.obstacle,
            MapChannel::Rock => &self.rock,
            MapChannel::Navigable => &self.navigable,
        }
    }

    fn channel_mut(&mut self, channel: MapChannel) -> &mut [u32] {
        match channel {
            MapChannel::Obstacle => &mut self.obstacle,
            MapChannel::Rock => &mut self.rock,
            MapChannel::Navigable => &mut self.navigable,
        }
    }
}

/// `true` when both roll and pitch are within `tolerance_deg` of level.
///
/// Attitude is reported on a `[0°, 360°)` scale, so a slight negative tilt
/// shows up as e.g. 359.8°; values outside that range are normalised first.
pub fn is_near_level(roll_deg: f32, pitch_deg: f32, tolerance_deg: f32) -> bool {
    let level = |angle: f32| {
        let a = angle.rem_euclid(360.0);
        a < tolerance_deg || a > 360.0 - tolerance_deg
    };
    level(roll_deg) && level(pitch_deg)
}
