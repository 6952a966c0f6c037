//! The seam between the training loop and a model

use bytes::Bytes;
use runtime_core::{Epoch, Result};

/// A model the training loop can drive
///
/// Scores follow the lower-is-better convention (validation loss).
pub trait Trainable: Send + Sync {
    /// Run one epoch of optimization
    fn train_epoch(&mut self, epoch: Epoch) -> Result<()>;

    /// Score the current state on held-out data
    fn validate(&mut self, epoch: Epoch) -> Result<f64>;

    /// Serialize model and optimizer state
    ///
    /// Only called when the checkpoint is actually going to be written.
    fn snapshot(&self, epoch: Epoch) -> Result<Bytes>;
}
