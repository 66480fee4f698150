//! Run configuration – reads/writes a `rover.toml` file.
//!
//! Every field has a default, so an empty file (or none at all) yields a
//! working configuration. After parsing, `ROVER_*` environment variables are
//! applied on top:
//!
//! | Variable | Config field |
//! |---|---|
//! | `ROVER_PROFILE` | `decision` (replaced by the `conservative` / `aggressive` preset) |
//! | `ROVER_THROTTLE` | `decision.throttle_setting` |
//! | `ROVER_MAX_VELOCITY` | `decision.max_velocity` |
//! | `ROVER_WORLD_SIZE` | `perception.world.size` |
//!
//! Values that fail to parse are ignored.

use std::fs;
use std::path::Path;

use rover_decision::{DecisionEngine, DecisionProfile, ProfileKind};
use rover_perception::{PerceptionConfig, PerceptionPipeline};
use rover_types::RoverError;
use serde::{Deserialize, Serialize};

/// Static configuration of one mission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    /// Camera frame width in pixels.
    pub frame_width: u32,
    /// Camera frame height in pixels.
    pub frame_height: u32,
    pub perception: PerceptionConfig,
    pub decision: DecisionProfile,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            frame_width: 320,
            frame_height: 160,
            perception: PerceptionConfig::default(),
            decision: DecisionProfile::default(),
        }
    }
}

impl RoverConfig {
    /// Reject configurations no tick could run on.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidConfig`] naming the first problem found.
    pub fn validate(&self) -> Result<(), RoverError> {
        self.build_stages().map(|_| ())
    }

    /// Build the perception and decision stages for this configuration.
    /// Each stage validates its own section, so this is the one place a
    /// configuration is checked.
    pub(crate) fn build_stages(&self) -> Result<(PerceptionPipeline, DecisionEngine), RoverError> {
        let (width, height) = (self.frame_width, self.frame_height);
        let pipeline = PerceptionPipeline::new(self.perception, width, height)?;
        let engine = DecisionEngine::new(self.decision, width as usize, height as usize)?;
        Ok((pipeline, engine))
    }
}

/// Load the config from `path`. Returns `Ok(None)` if the file does not
/// exist.
///
/// # Errors
///
/// [`RoverError::ConfigIo`] when the file cannot be read or parsed.
pub fn load_from(path: &Path) -> Result<Option<RoverConfig>, RoverError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| RoverError::ConfigIo(format!("failed to read {}: {e}", path.display())))?;
    let mut cfg: RoverConfig = toml::from_str(&raw)
        .map_err(|e| RoverError::ConfigIo(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Save the config to `path`, creating parent directories as needed.
///
/// # Errors
///
/// [`RoverError::ConfigIo`] when serialisation or the write fails.
pub fn save_to(cfg: &RoverConfig, path: &Path) -> Result<(), RoverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RoverError::ConfigIo(format!("failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RoverError::ConfigIo(format!("failed to serialise config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| RoverError::ConfigIo(format!("failed to write {}: {e}", path.display())))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
pub fn apply_env_overrides(cfg: &mut RoverConfig) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

/// Apply overrides read through `lookup`, in the same way as
/// [`apply_env_overrides`].
pub fn apply_overrides_from(cfg: &mut RoverConfig, lookup: impl Fn(&str) -> Option<String>) {
    // The preset goes first so the scalar overrides land on top of it.
    if let Some(v) = lookup("ROVER_PROFILE")
        && let Ok(kind) = v.parse::<ProfileKind>()
    {
        cfg.decision = DecisionProfile::preset(kind);
    }
    if let Some(v) = lookup("ROVER_THROTTLE")
        && let Ok(throttle) = v.trim().parse::<f32>()
    {
        cfg.decision.throttle_setting = throttle;
    }
    if let Some(v) = lookup("ROVER_MAX_VELOCITY")
        && let Ok(max) = v.trim().parse::<f32>()
    {
        cfg.decision.max_velocity = max;
    }
    if let Some(v) = lookup("ROVER_WORLD_SIZE")
        && let Ok(size) = v.trim().parse::<usize>()
    {
        cfg.perception.world.size = size;
    }
}
