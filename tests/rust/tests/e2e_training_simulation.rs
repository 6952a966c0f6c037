//! End-to-end training simulation test
//!
//! Runs the simulated model through the training loop on the local
//! filesystem and checks what the run directory holds afterwards:
//! - exactly `keep_best` retained artifacts plus the aliases and config
//! - the best alias decodes and restores the winning model state
//! - a second run never reuses an existing run directory

use anyhow::Result;
use runtime_core::{Error, RunConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::LocalStorage;
use tempfile::TempDir;
use trainer::{SimulatedModel, Trainable, TrainingLoop, CONFIG_FILE};

fn run_config(save_path: &Path) -> RunConfig {
    let mut config = RunConfig::default();
    config.experiment.name = "contours".to_string();
    config.experiment.save_path = save_path.to_path_buf();
    config.experiment.num_epochs = 40;
    config.experiment.save_delay = 5;
    config.checkpoint.keep_best = 3;
    config
}

fn retained_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with("chk-"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_simulated_training_run() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let save_path = TempDir::new()?;
    let training = TrainingLoop::new(run_config(save_path.path()))?;
    let mut model = SimulatedModel::new(8, 1234);

    let summary = training.run(&mut model).await?;

    // One run directory, named after the experiment
    let run_dirs: Vec<_> = std::fs::read_dir(save_path.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    assert_eq!(run_dirs.len(), 1);
    let run_dir = &run_dirs[0];
    assert!(run_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("contours_"));

    // Exactly keep_best artifacts remain, nothing before the warm-up delay
    let retained = retained_files(run_dir);
    assert_eq!(retained.len(), 3);
    assert_eq!(summary.retained.len(), 3);
    assert!(summary.retained.iter().all(|m| m.epoch + 1 >= 5));
    assert!(summary.orphans.is_empty());

    // Aliases and config are in place
    assert!(run_dir.join("best_chk.ckpt").exists());
    assert!(run_dir.join("last_chk.ckpt").exists());
    let config: RunConfig =
        serde_json::from_slice(&std::fs::read(run_dir.join(CONFIG_FILE))?)?;
    assert_eq!(config.checkpoint.keep_best, 3);

    // The winner is the minimum of what was retained
    let min = summary
        .retained
        .iter()
        .map(|m| m.score)
        .min()
        .expect("retained set is non-empty");
    assert_eq!(summary.best.score, min);
    assert!(Path::new(&summary.best_path).is_absolute());

    // Every offer was accounted for
    let offered = 40 - 4;
    assert_eq!(
        summary.stats.accepted + summary.stats.rejected_without_write,
        offered
    );
    assert_eq!(summary.stats.accepted - summary.stats.evicted, 3);

    Ok(())
}

#[tokio::test]
async fn test_best_alias_restores_model() -> Result<()> {
    let save_path = TempDir::new()?;
    let training = TrainingLoop::new(run_config(save_path.path()))?;
    let run_dir = training.run_dir("restore");
    TrainingLoop::create_run_dir(&run_dir).await?;

    let mut model = SimulatedModel::new(4, 99);
    let summary = training
        .run_with_storage(&mut model, Arc::new(LocalStorage::new(&run_dir)))
        .await?;

    let raw = std::fs::read(run_dir.join("best_chk.ckpt"))?;
    let (header, payload) = checkpoint::format::decode("best_chk.ckpt", raw.into())?;
    assert_eq!(header.epoch, summary.best.epoch);

    let mut restored = SimulatedModel::from_snapshot(&payload)?;
    assert_eq!(restored.epochs_trained(), summary.best.epoch + 1);
    assert_eq!(restored.validate(header.epoch)?, summary.best.score.value());

    Ok(())
}

#[tokio::test]
async fn test_existing_run_dir_is_refused() -> Result<()> {
    let save_path = TempDir::new()?;
    let training = TrainingLoop::new(run_config(save_path.path()))?;
    let run_dir = training.run_dir("fixed");

    TrainingLoop::create_run_dir(&run_dir).await?;
    let again = TrainingLoop::create_run_dir(&run_dir).await;
    assert!(matches!(again, Err(Error::RunDirExists { .. })));

    Ok(())
}
