use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::game::constants::{character, clock, net, projectile, turret};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Server Config
// ============================================================================

/// Process-level settings, read once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Simulation rate in Hz
    pub tick_rate: u32,
    /// Per-viewer snapshot byte budget
    pub max_snapshot_size: usize,
    /// Per-viewer snapshot item budget
    pub max_snapshot_items: usize,
    /// Port for the metrics endpoint, `None` disables it
    pub metrics_port: Option<u16>,
    /// JSON file with simulation tuning, reloaded on SIGHUP
    pub sim_config_path: Option<PathBuf>,
    /// Initial simulation tuning
    pub sim: SimConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: clock::DEFAULT_TICK_RATE,
            max_snapshot_size: net::MAX_SNAPSHOT_SIZE,
            max_snapshot_items: net::MAX_SNAPSHOT_ITEMS,
            metrics_port: Some(9090),
            sim_config_path: None,
            sim: SimConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(rate) = std::env::var("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (1..=1000).contains(&parsed) => config.tick_rate = parsed,
                Ok(_) => tracing::warn!("TICK_RATE must be 1-1000, using default"),
                Err(_) => tracing::warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        if let Ok(size) = std::env::var("MAX_SNAPSHOT_SIZE") {
            match size.parse::<usize>() {
                Ok(parsed) if parsed >= 64 => config.max_snapshot_size = parsed,
                Ok(_) => tracing::warn!("MAX_SNAPSHOT_SIZE must be at least 64, using default"),
                Err(_) => tracing::warn!("Invalid MAX_SNAPSHOT_SIZE '{}', using default", size),
            }
        }

        if let Ok(items) = std::env::var("MAX_SNAPSHOT_ITEMS") {
            match items.parse::<usize>() {
                Ok(parsed) if parsed > 0 && parsed <= u16::MAX as usize => {
                    config.max_snapshot_items = parsed
                }
                Ok(_) => tracing::warn!("MAX_SNAPSHOT_ITEMS must be 1-65535, using default"),
                Err(_) => tracing::warn!("Invalid MAX_SNAPSHOT_ITEMS '{}', using default", items),
            }
        }

        if let Ok(port) = std::env::var("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(0) => config.metrics_port = None,
                Ok(parsed) => config.metrics_port = Some(parsed),
                Err(_) => tracing::warn!("Invalid METRICS_PORT '{}', using default", port),
            }
        }

        if let Ok(path) = std::env::var("SIM_CONFIG_PATH") {
            config.sim_config_path = Some(PathBuf::from(path));
        }

        if let Ok(shots) = std::env::var("SHOTS_PER_SEC") {
            // Zero and negative values are valid: they switch turrets off
            match shots.parse::<i32>() {
                Ok(parsed) => config.sim.shots_per_sec = parsed,
                Err(_) => tracing::warn!("Invalid SHOTS_PER_SEC '{}', using default", shots),
            }
        }

        if let Ok(range) = std::env::var("TURRET_RANGE") {
            match range.parse::<f32>() {
                Ok(parsed) if parsed.is_finite() && parsed > 0.0 => config.sim.turret_range = parsed,
                Ok(_) => tracing::warn!("TURRET_RANGE must be positive, using default"),
                Err(_) => tracing::warn!("Invalid TURRET_RANGE '{}', using default", range),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate cannot be 0".to_string()));
        }
        if self.max_snapshot_items == 0 {
            return Err(ConfigError::Invalid(
                "max_snapshot_items must be at least 1".to_string(),
            ));
        }
        if self.max_snapshot_size < crate::net::snapshot::HEADER_SIZE {
            return Err(ConfigError::Invalid(
                "max_snapshot_size cannot hold a snapshot header".to_string(),
            ));
        }
        self.sim.validate()
    }
}

// ============================================================================
// Simulation Config
// ============================================================================

/// Gameplay tuning, hot-reloadable between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Shots per second per target identity; zero or less disables turrets
    pub shots_per_sec: i32,
    /// Turret targeting radius in world units
    pub turret_range: f32,
    /// Seconds between turret speed zone evaluations
    pub speed_zone_eval_secs: f32,
    pub projectile_speed: f32,
    /// Velocity multiplier applied to plasma every tick
    pub projectile_accel: f32,
    pub projectile_lifetime_secs: f32,
    /// How long a freeze plasma freezes its target
    pub freeze_secs: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            shots_per_sec: turret::DEFAULT_SHOTS_PER_SEC,
            turret_range: turret::DEFAULT_RANGE,
            speed_zone_eval_secs: turret::DEFAULT_SPEED_ZONE_EVAL_SECS,
            projectile_speed: projectile::DEFAULT_SPEED,
            projectile_accel: projectile::DEFAULT_ACCEL,
            projectile_lifetime_secs: projectile::DEFAULT_LIFETIME_SECS,
            freeze_secs: character::DEFAULT_FREEZE_SECS,
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("turret_range", self.turret_range),
            ("speed_zone_eval_secs", self.speed_zone_eval_secs),
            ("projectile_speed", self.projectile_speed),
            ("projectile_accel", self.projectile_accel),
            ("projectile_lifetime_secs", self.projectile_lifetime_secs),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !self.freeze_secs.is_finite() || self.freeze_secs < 0.0 {
            return Err(ConfigError::Invalid("freeze_secs cannot be negative".to_string()));
        }
        Ok(())
    }
}

/// Shared, hot-reloadable simulation config
///
/// The tick loop takes one [`snapshot`](ConfigHandle::snapshot) per tick, so a
/// reload never takes effect half way through a tick.
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<SimConfig>>,
}

impl ConfigHandle {
    pub fn new(config: SimConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn snapshot(&self) -> SimConfig {
        self.inner.read().clone()
    }

    pub fn replace(&self, config: SimConfig) {
        *self.inner.write() = config;
    }

    /// Reload from a JSON file; the current config is kept on error
    pub fn reload_from_file(&self, path: &Path) -> Result<(), ConfigError> {
        let config = SimConfig::from_file(path)?;
        tracing::info!(
            "Reloaded sim config from {}: {} shots/s, range {}",
            path.display(),
            config.shots_per_sec,
            config.turret_range
        );
        self.replace(config);
        Ok(())
    }
}
