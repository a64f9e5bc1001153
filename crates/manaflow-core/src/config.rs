//! Simulation configuration - tick rate, material table, system parameters.
//!
//! Loaded from JSON; every field is optional and falls back to the
//! defaults below.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{DiffusivityTable, ManaBounds};
use crate::grid::GridSettings;
use crate::systems::{DiffusionConfig, GenerationConfig, MAX_STABLE_RATE};

/// Smallest decay sharpness accepted
pub const MIN_DECAY_SHARPNESS: f32 = 0.01;

const BUILTIN_CONFIG_JSON: &str = include_str!("../../../data/default_simulation.json");

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub ticks_per_second: u32,
    /// Start in the paused state
    pub start_paused: bool,
    /// Most ticks a single `update` may run to catch up after a stall
    pub max_catch_up_ticks: u32,
    pub mana_bounds: ManaBounds,
    pub diffusivity: DiffusivityTable,
    pub generation: GenerationConfig,
    pub diffusion: DiffusionConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 5,
            start_paused: false,
            max_catch_up_ticks: 8,
            mana_bounds: ManaBounds::default(),
            diffusivity: DiffusivityTable::default(),
            generation: GenerationConfig::default(),
            diffusion: DiffusionConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse simulation config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read simulation config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid simulation config: {0}")]
    Invalid(String),
}

impl SimulationConfig {
    /// The config shipped in `data/default_simulation.json`
    pub fn builtin() -> Self {
        match Self::from_json_str(BUILTIN_CONFIG_JSON) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Built-in config unusable ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Parse and validate
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn grid_settings(&self) -> GridSettings {
        GridSettings {
            diffusivity: self.diffusivity,
            mana_bounds: self.mana_bounds,
        }
    }

    /// Seconds between ticks
    pub fn tick_interval(&self) -> f64 {
        1.0 / self.ticks_per_second.max(1) as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_second == 0 {
            return Err(invalid("ticks_per_second must be at least 1"));
        }
        if self.max_catch_up_ticks == 0 {
            return Err(invalid("max_catch_up_ticks must be at least 1"));
        }

        let bounds = self.mana_bounds;
        if !bounds.min.is_finite() || !bounds.max.is_finite() || bounds.min > bounds.max {
            return Err(invalid(format!(
                "mana bounds [{}, {}] are not a finite range",
                bounds.min, bounds.max
            )));
        }

        let table = self.diffusivity;
        for (name, value) in [
            ("empty", table.empty),
            ("ground", table.ground),
            ("wall", table.wall),
            ("mana_source", table.mana_source),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("diffusivity.{} must be >= 0, got {}", name, value)));
            }
        }

        let generation = self.generation;
        if !generation.base_rate.is_finite() || generation.base_rate < 0.0 {
            return Err(invalid("generation.base_rate must be >= 0"));
        }
        if !generation.decay_threshold.is_finite() {
            return Err(invalid("generation.decay_threshold must be finite"));
        }
        if !generation.decay_sharpness.is_finite() || generation.decay_sharpness < MIN_DECAY_SHARPNESS {
            return Err(invalid(format!(
                "generation.decay_sharpness must be >= {}",
                MIN_DECAY_SHARPNESS
            )));
        }

        let diffusion = self.diffusion;
        if !diffusion.rate.is_finite() || diffusion.rate < 0.0 {
            return Err(invalid("diffusion.rate must be >= 0"));
        }
        if diffusion.rate > MAX_STABLE_RATE {
            log::warn!(
                "diffusion.rate {} exceeds {}, the simulation may oscillate",
                diffusion.rate,
                MAX_STABLE_RATE
            );
        }
        if diffusion
            .weights
            .as_array()
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(invalid("diffusion.weights must all be >= 0"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}
