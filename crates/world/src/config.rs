//! Generator configuration, loaded from TOML with defaults for anything missing.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level generator settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// World seed handed to every step.
    pub seed: i32,
    /// Chebyshev radius (in chunks) of the initial working set around the origin.
    pub initial_radius: i32,
    pub cache: CacheConfig,
    pub terrain: TerrainConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            initial_radius: 2,
            cache: CacheConfig::default(),
            terrain: TerrainConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from `path`, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<GeneratorConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    GeneratorConfig::default()
                }
            },
            Err(err) => {
                if err.kind() == std::io::ErrorKind::NotFound {
                    warn!(
                        "Generator config not found at {}. Using defaults",
                        path.display()
                    );
                } else {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                GeneratorConfig::default()
            }
        }
    }

    /// Parse configuration from a TOML string, reporting errors to the caller.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid generator config")
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }
}

/// Chunk cache timing. All values are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Idle time after which an entry is evicted by the sweep.
    pub expiration_ms: u64,
    /// Period between sweeps.
    pub sweep_interval_ms: u64,
    /// Delay before the first sweep.
    pub sweep_initial_delay_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration_ms: 5 * 60 * 1000,
            sweep_interval_ms: 60 * 1000,
            sweep_initial_delay_ms: 60 * 1000,
        }
    }
}

impl CacheConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_millis(self.expiration_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn sweep_initial_delay(&self) -> Duration {
        Duration::from_millis(self.sweep_initial_delay_ms)
    }
}

/// Parameters read by the built-in terrain steps.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Water fills open columns up to this Y.
    pub sea_level: i32,
    /// Average surface height.
    pub base_height: i32,
    /// Maximum deviation of the surface from `base_height`.
    pub height_variation: i32,
    /// Y at which cloud areas are placed.
    pub cloud_height: f32,
    /// Noise threshold below which caves are carved (0.0 disables caves).
    pub cave_threshold: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            sea_level: 62,
            base_height: 64,
            height_variation: 24,
            cloud_height: 192.0,
            cave_threshold: 0.28,
        }
    }
}
