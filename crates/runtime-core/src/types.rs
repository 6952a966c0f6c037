//! Core type definitions for checkpoint retention

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Training epoch counter
pub type Epoch = u64;

/// Store-assigned offer counter, used as the tie-break key
pub type Sequence = u64;

/// Checkpoint identifier (the storage path of the artifact)
pub type CheckpointId = String;

/// Scalar fitness of a candidate, lower is better
///
/// Ordering is total: finite values ascend, and every NaN sorts after every
/// other value. All NaNs compare equal to each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(pub f64);

impl Score {
    /// Raw value
    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Score(value)
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.is_nan(), other.0.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal),
        }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A retained candidate
///
/// Entries rank by `(score, sequence)`: a greater entry is a worse one, so
/// on equal scores the older candidate wins. Sequences are unique within a
/// store, which makes the rank a total order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry<H> {
    /// Candidate score
    pub score: Score,

    /// Offer sequence number
    pub sequence: Sequence,

    /// Handle of the materialized artifact
    pub handle: H,
}

impl<H> Entry<H> {
    /// Create a new entry
    pub fn new(score: Score, sequence: Sequence, handle: H) -> Self {
        Self {
            score,
            sequence,
            handle,
        }
    }

    /// Compare two candidates by rank without needing a handle
    pub fn rank(score: &Score, sequence: Sequence, other_score: &Score, other_sequence: Sequence) -> Ordering {
        score
            .cmp(other_score)
            .then_with(|| sequence.cmp(&other_sequence))
    }
}

impl<H> Ord for Entry<H> {
    fn cmp(&self, other: &Self) -> Ordering {
        Entry::<H>::rank(&self.score, self.sequence, &other.score, other.sequence)
    }
}

impl<H> PartialOrd for Entry<H> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<H> PartialEq for Entry<H> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<H> Eq for Entry<H> {}

/// Result of offering a candidate to the retention store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferOutcome<H> {
    /// Stored without eviction pressure
    Accepted { handle: H },

    /// Stored, and the previous worst entry was evicted
    AcceptedWithEviction { handle: H, evicted: H },

    /// Would have been evicted immediately, so it was never written
    RejectedWithoutWrite,
}

impl<H> OfferOutcome<H> {
    /// Handle of the newly stored artifact, if any
    pub fn handle(&self) -> Option<&H> {
        match self {
            OfferOutcome::Accepted { handle } | OfferOutcome::AcceptedWithEviction { handle, .. } => {
                Some(handle)
            }
            OfferOutcome::RejectedWithoutWrite => None,
        }
    }
}

/// Which retained entry `finalize` designates as the winner
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WinnerPolicy {
    /// The minimum-score entry
    #[default]
    Best,

    /// Whatever sits on top of the worst-first heap, i.e. the worst retained
    /// entry once more than one is kept
    HeapTop,
}

/// Checkpoint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Storage path, doubles as the retention handle
    pub id: CheckpointId,

    /// Training epoch at checkpoint
    pub epoch: Epoch,

    /// Offer sequence number
    pub sequence: Sequence,

    /// Validation score at checkpoint
    pub score: Score,

    /// Artifact size in bytes
    pub size_bytes: u64,

    /// Timestamp when checkpoint was created
    pub created_at: DateTime<Utc>,

    /// Additional metadata
    pub metadata: HashMap<String, String>,
}
