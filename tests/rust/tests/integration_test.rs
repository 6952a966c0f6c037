//! Retention scenarios against real files in a temporary run directory

use anyhow::Result;
use bytes::Bytes;
use checkpoint::CheckpointManager;
use runtime_core::{CheckpointConfig, Error, OfferOutcome, WinnerPolicy};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storage::LocalStorage;
use tempfile::TempDir;

fn manager(dir: &Path, keep_best: usize) -> Result<CheckpointManager> {
    let config = CheckpointConfig {
        keep_best,
        ..Default::default()
    };
    Ok(CheckpointManager::new(config, Arc::new(LocalStorage::new(dir)))?)
}

/// Offer scores epoch by epoch, counting snapshot calls
async fn offer_all(
    manager: &CheckpointManager,
    scores: &[f64],
    snapshots: &AtomicUsize,
) -> Result<Vec<OfferOutcome<String>>> {
    let mut outcomes = Vec::new();
    for (epoch, score) in scores.iter().enumerate() {
        let outcome = manager
            .offer(*score, epoch as u64, || {
                snapshots.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from(format!("weights@{}", epoch)))
            })
            .await?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn files_on_disk(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_scenario_a_evicts_worst_file() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(dir.path(), 2)?;
    let snapshots = AtomicUsize::new(0);

    let outcomes = offer_all(&manager, &[5.0, 3.0, 4.0], &snapshots).await?;

    assert_eq!(
        outcomes[2],
        OfferOutcome::AcceptedWithEviction {
            handle: "chk-0002.ckpt".to_string(),
            evicted: "chk-0000.ckpt".to_string(),
        }
    );
    assert_eq!(files_on_disk(dir.path()), vec!["chk-0001.ckpt", "chk-0002.ckpt"]);
    Ok(())
}

#[tokio::test]
async fn test_scenario_b_lazy_write() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(dir.path(), 1)?;
    let snapshots = AtomicUsize::new(0);

    let outcomes = offer_all(&manager, &[2.0, 1.0, 3.0], &snapshots).await?;

    assert_eq!(outcomes[2], OfferOutcome::RejectedWithoutWrite);
    assert_eq!(snapshots.load(Ordering::SeqCst), 2);
    assert_eq!(files_on_disk(dir.path()), vec!["chk-0001.ckpt"]);
    Ok(())
}

#[tokio::test]
async fn test_scenario_c_under_capacity() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(dir.path(), 3)?;
    let snapshots = AtomicUsize::new(0);

    let outcomes = offer_all(&manager, &[7.0, 2.0], &snapshots).await?;

    assert!(outcomes
        .iter()
        .all(|o| matches!(o, OfferOutcome::Accepted { .. })));
    assert_eq!(manager.all_checkpoints().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_scenario_d_nan_never_written() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(dir.path(), 2)?;
    let snapshots = AtomicUsize::new(0);

    let outcomes = offer_all(&manager, &[0.4, 0.6, f64::NAN], &snapshots).await?;

    assert_eq!(outcomes[2], OfferOutcome::RejectedWithoutWrite);
    assert_eq!(snapshots.load(Ordering::SeqCst), 2);
    assert!(!dir.path().join("chk-0002.ckpt").exists());
    Ok(())
}

#[tokio::test]
async fn test_finalize_copies_winner_and_closes() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(dir.path(), 3)?;
    let snapshots = AtomicUsize::new(0);
    offer_all(&manager, &[0.8, 0.3, 0.5, 0.9], &snapshots).await?;

    let best = manager.finalize().await?;
    assert_eq!(best.id, "chk-0001.ckpt");
    assert_eq!(
        std::fs::read(dir.path().join("best_chk.ckpt"))?,
        std::fs::read(dir.path().join("chk-0001.ckpt"))?
    );

    let (header, payload) = manager.load("best_chk.ckpt").await?;
    assert_eq!(header.epoch, 1);
    assert_eq!(payload, Bytes::from("weights@1"));

    let late = manager.offer(0.0, 10, || Ok(Bytes::new())).await;
    assert!(matches!(late, Err(Error::UseAfterFinalize)));
    Ok(())
}

#[tokio::test]
async fn test_heap_top_policy_publishes_worst_retained() -> Result<()> {
    let dir = TempDir::new()?;
    let config = CheckpointConfig {
        keep_best: 2,
        winner: WinnerPolicy::HeapTop,
        ..Default::default()
    };
    let manager = CheckpointManager::new(config, Arc::new(LocalStorage::new(dir.path())))?;
    let snapshots = AtomicUsize::new(0);
    offer_all(&manager, &[0.2, 0.6, 0.1], &snapshots).await?;

    let winner = manager.finalize().await?;
    assert_eq!(winner.id, "chk-0000.ckpt");
    assert_eq!(manager.best().map(|m| m.id), Some("chk-0002.ckpt".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_offers_for_same_epoch() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(dir.path(), 3)?;

    let (first, second) = tokio::join!(
        manager.offer(2.0, 4, || Ok(Bytes::from_static(b"first"))),
        manager.offer(1.0, 4, || Ok(Bytes::from_static(b"second"))),
    );

    assert!(matches!(first, Ok(OfferOutcome::Accepted { .. })));
    assert!(matches!(second, Err(Error::DuplicateHandle { .. })));

    // The retained artifact and its metadata still describe the accepted offer
    let (header, payload) = manager.load("chk-0004.ckpt").await?;
    assert_eq!(header.score.value(), 2.0);
    assert_eq!(payload, Bytes::from_static(b"first"));
    let retained = manager.all_checkpoints();
    assert_eq!(retained.len(), 1);
    assert_eq!(retained[0].score.value(), 2.0);
    assert_eq!(files_on_disk(dir.path()), vec!["chk-0004.ckpt"]);
    Ok(())
}

#[tokio::test]
async fn test_missing_evicted_file_is_reported() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(dir.path(), 1)?;
    let snapshots = AtomicUsize::new(0);
    offer_all(&manager, &[0.5], &snapshots).await?;

    // Someone removed the artifact behind the store's back
    std::fs::remove_file(dir.path().join("chk-0000.ckpt"))?;

    let result = manager
        .offer(0.1, 1, || Ok(Bytes::from_static(b"better")))
        .await;
    assert!(matches!(result, Err(Error::DeletionFailed { .. })));
    assert_eq!(manager.best().map(|m| m.id), Some("chk-0001.ckpt".to_string()));
    assert_eq!(manager.orphans().await, vec!["chk-0000.ckpt".to_string()]);
    Ok(())
}
