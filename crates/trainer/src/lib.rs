//! Trainer - the training loop side of checkpoint retention
//!
//! Drives a [`Trainable`] epoch by epoch, offers each validation score to a
//! [`checkpoint::CheckpointManager`] after the warm-up delay, and publishes
//! the winning checkpoint when the run ends.

pub mod simulated;
pub mod trainable;
pub mod training_loop;

pub use simulated::SimulatedModel;
pub use trainable::Trainable;
pub use training_loop::{OfferStats, RunSummary, TrainingLoop, CONFIG_FILE};
