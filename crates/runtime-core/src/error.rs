//! Error types for checkpoint retention and training runs

use thiserror::Error;

/// Result type alias using the runtime Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by every crate in the workspace
#[derive(Error, Debug)]
pub enum Error {
    // Retention store errors
    #[error("Invalid retention capacity: {capacity} (must be at least 1)")]
    InvalidCapacity { capacity: usize },

    #[error("Artifact materialization failed: {message}")]
    MaterializationFailed { message: String },

    #[error("Failed to delete evicted artifact {handle}: {message}")]
    DeletionFailed { handle: String, message: String },

    #[error("Retention store is empty, no checkpoint was ever accepted")]
    EmptyStore,

    #[error("Retention store already finalized")]
    UseAfterFinalize,

    #[error("Duplicate artifact handle: {handle}")]
    DuplicateHandle { handle: String },

    // Checkpoint errors
    #[error("Checkpoint not found: {checkpoint_id}")]
    CheckpointNotFound { checkpoint_id: String },

    #[error("Checkpoint corrupted: {checkpoint_id} - {reason}")]
    CheckpointCorrupted { checkpoint_id: String, reason: String },

    // Run directory errors
    #[error("Run directory already exists: {path}")]
    RunDirExists { path: String },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Storage path not found: {path}")]
    StoragePathNotFound { path: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns true if the run should keep going after this error
    ///
    /// A failed eviction only leaves a stray artifact behind; the new
    /// checkpoint is already committed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DeletionFailed { .. } | Error::StoragePathNotFound { .. }
        )
    }

    /// Returns true if this error indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidCapacity { .. }
                | Error::MaterializationFailed { .. }
                | Error::UseAfterFinalize
                | Error::DuplicateHandle { .. }
                | Error::CheckpointCorrupted { .. }
                | Error::InvalidConfig { .. }
                | Error::RunDirExists { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
