//! Run configuration types

use crate::{Error, Result, WinnerPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Experiment settings
    pub experiment: ExperimentConfig,

    /// Checkpoint retention settings
    pub checkpoint: CheckpointConfig,
}

impl RunConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfig {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let config: RunConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint.keep_best == 0 {
            return Err(Error::InvalidConfig {
                message: "checkpoint.keep_best must be at least 1".to_string(),
            });
        }
        if self.experiment.num_epochs == 0 {
            return Err(Error::InvalidConfig {
                message: "experiment.num_epochs must be at least 1".to_string(),
            });
        }
        if self.experiment.save_delay > self.experiment.num_epochs {
            return Err(Error::InvalidConfig {
                message: format!(
                    "experiment.save_delay ({}) exceeds experiment.num_epochs ({}), nothing would be saved",
                    self.experiment.save_delay, self.experiment.num_epochs
                ),
            });
        }
        if self.experiment.name.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "experiment.name must not be empty".to_string(),
            });
        }
        if self.checkpoint.best_alias == self.checkpoint.last_alias {
            return Err(Error::InvalidConfig {
                message: "checkpoint.best_alias and checkpoint.last_alias must differ".to_string(),
            });
        }
        Ok(())
    }
}

/// Experiment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Experiment name, prefix of the run directory
    pub name: String,

    /// Parent directory for run directories
    pub save_path: PathBuf,

    /// Number of epochs to train
    pub num_epochs: u64,

    /// First 1-based epoch whose checkpoint is offered for retention
    pub save_delay: u64,

    /// Seed for the simulated model
    pub seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: "experiment".to_string(),
            save_path: PathBuf::from("./runs"),
            num_epochs: 50,
            save_delay: 1,
            seed: 1234,
        }
    }
}

/// Checkpoint retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Number of best checkpoints to keep
    pub keep_best: usize,

    /// Alias the winning checkpoint is copied to after the run
    pub best_alias: String,

    /// Alias for the unconditional final-epoch checkpoint
    pub last_alias: String,

    /// Always persist the state after the last epoch
    pub save_final: bool,

    /// Which retained checkpoint counts as the winner
    pub winner: WinnerPolicy,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            keep_best: 3,
            best_alias: "best_chk.ckpt".to_string(),
            last_alias: "last_chk.ckpt".to_string(),
            save_final: true,
            winner: WinnerPolicy::Best,
        }
    }
}
