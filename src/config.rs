//! Simulation configuration files
//!
//! A [`SimulationConfig`] is read from YAML (`.yaml`, `.yml`) or JSON
//! (`.json`); the format is chosen from the file extension. Every field has
//! a default, so a config file only needs the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisSettings;
use crate::error::{ConfigError, SimError, SimResult};
use crate::grid::VolumeGrid;
use crate::physics::PhysicsSettings;

/// Default voxels per axis
pub const DEFAULT_RESOLUTION: u32 = 64;

/// Default number of generators
pub const DEFAULT_GENERATOR_COUNT: u32 = 32;

/// Default number of frames for a headless run
pub const DEFAULT_FRAMES: u32 = 100;

/// Default frame time in seconds
pub const DEFAULT_DT: f32 = 0.016;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub const ALL: [ConfigFormat; 2] = [ConfigFormat::Yaml, ConfigFormat::Json];

    /// File extensions this format is read from
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ConfigFormat::Yaml => &["yaml", "yml"],
            ConfigFormat::Json => &["json"],
        }
    }

    /// Find the format for a file extension, ignoring case
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| {
            format
                .extensions()
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext))
        })
    }

    /// Determine the format of a config file from its path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnknownExtension(path.display().to_string()))?;
        Self::from_extension(ext).ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))
    }
}

/// Everything needed to set up and run a headless simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub resolution: u32,
    pub generator_count: u32,
    /// RNG seed for generator placement; entropy when absent
    pub seed: Option<u64>,
    pub frames: u32,
    pub dt: f32,
    pub physics: PhysicsSettings,
    pub analysis: AnalysisSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            generator_count: DEFAULT_GENERATOR_COUNT,
            seed: None,
            frames: DEFAULT_FRAMES,
            dt: DEFAULT_DT,
            physics: PhysicsSettings::default(),
            analysis: AnalysisSettings::default(),
        }
    }
}

impl SimulationConfig {
    /// Load a config file, dispatching on its extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse config text in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check every value a simulation would reject
    pub fn validate(&self) -> SimResult<()> {
        VolumeGrid::new(self.resolution)?;
        if self.generator_count == 0 {
            return Err(SimError::NoGenerators);
        }
        self.physics.validate()?;
        self.analysis.validate()
    }
}
