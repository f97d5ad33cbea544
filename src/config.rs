// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::debounce::{TurnTieBreak, DEFAULT_CAPACITY, MAX_CAPACITY, MIN_CAPACITY};
use crate::error::ConfigError;
use crate::types::ConnectionMode;

pub const CONFIG_ENV: &str = "MINDCHAIR_CONFIG";
pub const CONFIG_FILE: &str = "mindchair.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of classifications kept in the debounce window.
    pub window_capacity: usize,
    pub turn_tie_break: TurnTieBreak,
    pub tick_ms: u64,
    /// Forward speed in world units per second.
    pub chair_speed: f32,
    /// Turn rate in degrees per second.
    pub rotation_speed: f32,
    pub profile_path: PathBuf,
    pub connection_mode: ConnectionMode,
    /// Probability that a simulated classification is replaced by noise.
    pub sim_noise: f64,
    pub sim_training_ticks: u32,
    /// Delay before the saved profile is loaded after connecting.
    pub profile_load_delay_ms: u64,
    /// Where session CSVs are written.
    pub recording_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_CAPACITY,
            turn_tie_break: TurnTieBreak::default(),
            tick_ms: 20,
            chair_speed: 12.0,
            rotation_speed: 60.0,
            profile_path: PathBuf::from("EmotivData.emu"),
            connection_mode: ConnectionMode::Simulation,
            sim_noise: 0.25,
            sim_training_ticks: 150,
            profile_load_delay_ms: 250,
            recording_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&self.window_capacity) {
            return Err(ConfigError::CapacityOutOfRange(self.window_capacity));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::NonPositive { field: "tick_ms" });
        }
        if !(self.chair_speed > 0.0) {
            return Err(ConfigError::NonPositive { field: "chair_speed" });
        }
        if !(self.rotation_speed > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "rotation_speed",
            });
        }
        if !(0.0..=1.0).contains(&self.sim_noise) {
            return Err(ConfigError::NoiseOutOfRange(self.sim_noise));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn profile_load_delay(&self) -> Duration {
        Duration::from_millis(self.profile_load_delay_ms)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// `$MINDCHAIR_CONFIG`, else `mindchair.json` next to the executable,
    /// else defaults.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::resolve(explicit, &Self::beside_executable())
    }

    fn beside_executable() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE)))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    fn resolve(explicit: Option<PathBuf>, local: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(&path);
        }
        if local.exists() {
            return Self::from_file(local);
        }
        log::info!("no {} found, using defaults", local.display());
        Ok(Self::default())
    }
}
