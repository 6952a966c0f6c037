//! Checkpoint manager binding the retention store to a storage backend

use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use runtime_core::{
    CheckpointConfig, CheckpointId, CheckpointMetadata, Entry, Epoch, Error, OfferOutcome, Result,
    Score,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use storage::StorageBackend;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::format::{self, CheckpointHeader};
use crate::retention::RetentionStore;

/// Artifact name for a retained checkpoint
pub fn artifact_name(epoch: Epoch) -> CheckpointId {
    format!("chk-{:04}.ckpt", epoch)
}

/// State guarded by the manager's single lock
struct Guarded {
    store: RetentionStore<CheckpointId>,
    best_published: bool,
}

/// Keeps the best `keep_best` checkpoints of a run on a storage backend
///
/// Every mutating call holds one coarse lock for its whole duration, so
/// offers and finalization are linearized even when the manager is shared.
pub struct CheckpointManager {
    /// Configuration
    config: CheckpointConfig,

    /// Where artifacts live
    storage: Arc<dyn StorageBackend>,

    /// Retention state
    guarded: Mutex<Guarded>,

    /// Metadata of retained checkpoints, by artifact name
    checkpoints: RwLock<HashMap<CheckpointId, CheckpointMetadata>>,
}

impl CheckpointManager {
    /// Create a new checkpoint manager
    pub fn new(config: CheckpointConfig, storage: Arc<dyn StorageBackend>) -> Result<Self> {
        let store = RetentionStore::new(config.keep_best)?.with_winner_policy(config.winner);

        Ok(Self {
            config,
            storage,
            guarded: Mutex::new(Guarded {
                store,
                best_published: false,
            }),
            checkpoints: RwLock::new(HashMap::new()),
        })
    }

    /// Get the retention configuration
    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Get the storage backend artifacts are written to
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Offer the state after `epoch`, scored by `score`
    ///
    /// `snapshot` serializes the state and only runs when the checkpoint is
    /// going to be kept.
    #[instrument(skip(self, snapshot))]
    pub async fn offer<F>(
        &self,
        score: f64,
        epoch: Epoch,
        snapshot: F,
    ) -> Result<OfferOutcome<CheckpointId>>
    where
        F: FnOnce() -> Result<Bytes> + Send,
    {
        let score = Score(score);
        let path = artifact_name(epoch);

        let mut guarded = self.guarded.lock().await;
        if guarded.store.is_finalized() {
            return Err(Error::UseAfterFinalize);
        }
        // Never overwrite an artifact, retained or not
        if guarded.store.contains(&path) || self.storage.exists(&path).await? {
            warn!(checkpoint_id = %path, epoch, "Artifact already exists, offer refused");
            return Err(Error::DuplicateHandle { handle: path });
        }

        let storage = &self.storage;
        let mut materialized: Option<CheckpointMetadata> = None;
        let slot = &mut materialized;

        let result = guarded
            .store
            .offer_async(
                score,
                move |sequence| async move {
                    let payload = snapshot()?;
                    let mut kind = HashMap::new();
                    kind.insert("kind".to_string(), "retained".to_string());
                    let header = CheckpointHeader::new(epoch, sequence, score, payload.len() as u64)
                        .with_metadata(kind.clone());
                    let size_bytes = storage.write(&path, format::encode(&header, &payload)?).await?;

                    *slot = Some(CheckpointMetadata {
                        id: path.clone(),
                        epoch,
                        sequence,
                        score,
                        size_bytes,
                        created_at: Utc::now(),
                        metadata: kind,
                    });
                    Ok::<_, Error>(path)
                },
                |evicted| async move { storage.delete(&evicted).await },
            )
            .await;

        let committed = match &result {
            Ok(_) | Err(Error::DeletionFailed { .. }) => materialized,
            Err(_) => None,
        };
        self.sync_index(guarded.store.peek_all(), committed);

        match &result {
            Ok(OfferOutcome::Accepted { handle }) => {
                info!(checkpoint_id = %handle, epoch, "Checkpoint retained");
            }
            Ok(OfferOutcome::AcceptedWithEviction { handle, evicted }) => {
                info!(checkpoint_id = %handle, evicted = %evicted, epoch, "Checkpoint retained, evicted worst");
            }
            Ok(OfferOutcome::RejectedWithoutWrite) => {
                debug!(epoch, "Checkpoint not better than retained set, not written");
            }
            Err(e) => warn!(epoch, error = %e, "Checkpoint offer failed"),
        }

        result
    }

    /// Close retention and copy the winner to the best alias
    ///
    /// Safe to call again: the winner does not change and the alias is only
    /// copied until it succeeds once.
    #[instrument(skip(self))]
    pub async fn finalize(&self) -> Result<CheckpointMetadata> {
        let mut guarded = self.guarded.lock().await;
        let winner = guarded.store.finalize()?;

        let metadata = self
            .checkpoints
            .read()
            .get(&winner)
            .cloned()
            .ok_or_else(|| Error::CheckpointNotFound {
                checkpoint_id: winner.clone(),
            })?;

        if !guarded.best_published {
            let size = self.storage.copy(&winner, &self.config.best_alias).await?;
            guarded.best_published = true;
            info!(
                checkpoint_id = %winner,
                alias = %self.config.best_alias,
                score = %metadata.score,
                size_bytes = size,
                "Published best checkpoint"
            );
        }

        Ok(metadata)
    }

    /// Write the final-epoch state to the last alias, outside retention
    pub async fn save_final(&self, score: f64, epoch: Epoch, payload: Bytes) -> Result<u64> {
        let mut kind = HashMap::new();
        kind.insert("kind".to_string(), "final".to_string());
        let header =
            CheckpointHeader::new(epoch, 0, Score(score), payload.len() as u64).with_metadata(kind);

        let size = self
            .storage
            .write(&self.config.last_alias, format::encode(&header, &payload)?)
            .await?;
        info!(alias = %self.config.last_alias, epoch, size_bytes = size, "Saved final checkpoint");
        Ok(size)
    }

    /// Read and decode an artifact
    pub async fn load(&self, path: &str) -> Result<(CheckpointHeader, Bytes)> {
        let data = self.storage.read(path).await.map_err(|e| match e {
            Error::StoragePathNotFound { .. } => Error::CheckpointNotFound {
                checkpoint_id: path.to_string(),
            },
            other => other,
        })?;
        format::decode(path, data)
    }

    /// Retained checkpoints, best first
    pub fn all_checkpoints(&self) -> Vec<CheckpointMetadata> {
        let mut all: Vec<_> = self.checkpoints.read().values().cloned().collect();
        all.sort_by(|a, b| Entry::<()>::rank(&a.score, a.sequence, &b.score, b.sequence));
        all
    }

    /// Best retained checkpoint so far
    pub fn best(&self) -> Option<CheckpointMetadata> {
        self.all_checkpoints().into_iter().next()
    }

    /// Evicted artifacts that could not be deleted
    pub async fn orphans(&self) -> Vec<CheckpointId> {
        self.guarded.lock().await.store.orphans().to_vec()
    }

    /// Absolute location of the best alias
    pub fn best_location(&self) -> String {
        self.storage.locate(&self.config.best_alias)
    }

    /// Make the metadata index mirror the retained set
    fn sync_index(
        &self,
        retained: Vec<Entry<CheckpointId>>,
        materialized: Option<CheckpointMetadata>,
    ) {
        let retained: HashSet<CheckpointId> = retained.into_iter().map(|e| e.handle).collect();
        let mut checkpoints = self.checkpoints.write();

        if let Some(meta) = materialized {
            if retained.contains(&meta.id) {
                checkpoints.insert(meta.id.clone(), meta);
            }
        }
        checkpoints.retain(|id, _| retained.contains(id));
    }
}
