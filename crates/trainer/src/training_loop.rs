//! Epoch loop that feeds validation scores into checkpoint retention

use checkpoint::CheckpointManager;
use chrono::Local;
use runtime_core::{CheckpointMetadata, Error, OfferOutcome, Result, RunConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{LocalStorage, StorageBackend};
use tracing::{error, info, instrument, warn};

use crate::Trainable;

/// Name of the run configuration written into every run directory
pub const CONFIG_FILE: &str = "config.json";

/// Counts of what happened to each offered checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OfferStats {
    pub accepted: u64,
    pub evicted: u64,
    pub rejected_without_write: u64,
    pub deletion_failures: u64,
}

impl OfferStats {
    fn record(&mut self, outcome: &OfferOutcome<String>) {
        match outcome {
            OfferOutcome::Accepted { .. } => self.accepted += 1,
            OfferOutcome::AcceptedWithEviction { .. } => {
                self.accepted += 1;
                self.evicted += 1;
            }
            OfferOutcome::RejectedWithoutWrite => self.rejected_without_write += 1,
        }
    }

    /// The candidate was kept but the evicted artifact stayed behind
    fn record_failed_cleanup(&mut self) {
        self.accepted += 1;
        self.evicted += 1;
        self.deletion_failures += 1;
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Winning checkpoint
    pub best: CheckpointMetadata,

    /// Absolute location of the winning artifact
    pub best_path: String,

    /// Absolute location of the best alias copy
    pub alias_path: String,

    /// Retained checkpoints at the end of the run, best first
    pub retained: Vec<CheckpointMetadata>,

    /// Evicted artifacts that could not be removed
    pub orphans: Vec<String>,

    /// Offer counters
    pub stats: OfferStats,
}

/// Drives a [`Trainable`] through a run
pub struct TrainingLoop {
    config: RunConfig,
}

impl TrainingLoop {
    /// Create a training loop from a validated configuration
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run directory for a given timestamp label
    pub fn run_dir(&self, stamp: &str) -> PathBuf {
        self.config
            .experiment
            .save_path
            .join(format!("{}_{}", self.config.experiment.name, stamp))
    }

    /// Create a fresh run directory, refusing to reuse one
    pub async fn create_run_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match tokio::fs::create_dir(path).await {
            Ok(()) => {
                info!(path = %path.display(), "Created run directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(Error::RunDirExists {
                path: path.display().to_string(),
            }),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Train in a new timestamped run directory on the local filesystem
    pub async fn run<M: Trainable>(&self, model: &mut M) -> Result<RunSummary> {
        let stamp = Local::now().format("%Y_%m_%d-%H_%M_%S").to_string();
        let run_dir = self.run_dir(&stamp);
        Self::create_run_dir(&run_dir).await?;

        self.run_with_storage(model, Arc::new(LocalStorage::new(&run_dir)))
            .await
    }

    /// Train against an arbitrary storage backend
    #[instrument(skip_all, fields(experiment = %self.config.experiment.name))]
    pub async fn run_with_storage<M: Trainable>(
        &self,
        model: &mut M,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<RunSummary> {
        let experiment = &self.config.experiment;
        let checkpoint = &self.config.checkpoint;

        if !storage.list("").await?.is_empty() {
            return Err(Error::RunDirExists {
                path: storage.locate(""),
            });
        }

        let config_json = serde_json::to_vec_pretty(&self.config)?;
        storage.write(CONFIG_FILE, config_json.into()).await?;

        let manager = CheckpointManager::new(checkpoint.clone(), storage)?;
        let mut stats = OfferStats::default();

        info!(
            num_epochs = experiment.num_epochs,
            keep_best = checkpoint.keep_best,
            save_delay = experiment.save_delay,
            "Starting training run"
        );

        for epoch in 0..experiment.num_epochs {
            model.train_epoch(epoch)?;
            let score = model.validate(epoch)?;
            let state = &*model;

            if epoch + 1 >= experiment.save_delay {
                match manager.offer(score, epoch, || state.snapshot(epoch)).await {
                    Ok(outcome) => stats.record(&outcome),
                    Err(e) if e.is_recoverable() => {
                        stats.record_failed_cleanup();
                        warn!(epoch, error = %e, "Continuing after failed checkpoint cleanup");
                    }
                    Err(e) => {
                        error!(epoch, error = %e, fatal = e.is_fatal(), "Aborting training run");
                        return Err(e);
                    }
                }
            }

            if checkpoint.save_final && epoch + 1 == experiment.num_epochs {
                manager
                    .save_final(score, epoch, state.snapshot(epoch)?)
                    .await?;
            }

            info!(epoch, val_loss = score, "Epoch complete");
        }

        let best = manager.finalize().await?;
        let summary = RunSummary {
            best_path: manager.storage().locate(&best.id),
            alias_path: manager.best_location(),
            retained: manager.all_checkpoints(),
            orphans: manager.orphans().await,
            best,
            stats,
        };

        info!(
            best = %summary.best.id,
            score = %summary.best.score,
            epoch = summary.best.epoch,
            retained = summary.retained.len(),
            "Training run finished"
        );
        Ok(summary)
    }
}
