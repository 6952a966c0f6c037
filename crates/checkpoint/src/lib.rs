//! Checkpoint retention for training runs
//!
//! Keeps the best-scoring checkpoints of a run, skips writing candidates
//! that would be evicted straight away, and publishes the winner at the end.

pub mod format;
pub mod manager;
pub mod retention;

pub use format::{CheckpointHeader, CHECKPOINT_MAGIC, CHECKPOINT_VERSION};
pub use manager::{artifact_name, CheckpointManager};
pub use retention::RetentionStore;
