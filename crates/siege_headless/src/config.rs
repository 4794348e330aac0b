//! Match configuration loading.
//!
//! A [`MatchConfig`] is a RON file describing everything about a headless
//! match that is not a CLI concern: the seed, AI difficulties, the duration
//! cap, and an optional stat override file for balance experiments.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use siege_ai::Difficulty;
use siege_core::stats::StatTable;
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found.
    #[error("config file not found: {0}")]
    FileNotFound(String),
    /// Failed to read a file.
    #[error("failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A stat override file failed to parse.
    #[error(transparent)]
    StatError(#[from] siege_core::error::SimError),
}

/// Everything a headless match needs besides the transport endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Seed shared by the simulation and the AI opponents.
    pub seed: u64,
    /// Difficulty for the red AI (host side / skirmish left seat).
    pub red_difficulty: Difficulty,
    /// Difficulty for the blue AI (joiner side / skirmish right seat).
    pub blue_difficulty: Difficulty,
    /// Game-time cap in minutes; a skirmish that outlives it is a draw.
    pub max_minutes: u32,
    /// TCP port when hosting.
    pub port: u16,
    /// Optional RON file of stat overrides merged over the standard table.
    pub stat_overrides: Option<PathBuf>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            red_difficulty: Difficulty::Normal,
            blue_difficulty: Difficulty::Normal,
            max_minutes: 30,
            port: siege_net::DEFAULT_PORT,
            stat_overrides: None,
        }
    }
}

impl MatchConfig {
    /// Load a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }

    /// Load from a RON string (useful for embedded configs and tests).
    pub fn from_ron_str(ron: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(ron)?)
    }

    /// Build the stat table this match plays with, applying the override
    /// file when one is configured.
    pub fn stat_table(&self) -> Result<StatTable, ConfigError> {
        match &self.stat_overrides {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.display().to_string()));
                }
                let contents = std::fs::read_to_string(path)?;
                Ok(StatTable::with_overrides(&contents)?)
            }
            None => Ok(StatTable::standard()),
        }
    }

    /// The duration cap in simulation ticks.
    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        u64::from(self.max_minutes) * 60 * u64::from(siege_core::simulation::TICK_RATE)
    }
}

// ====== Tests ======
