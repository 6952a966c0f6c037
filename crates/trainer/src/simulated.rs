//! Deterministic stand-in model
//!
//! Plain momentum descent on a quadratic. The validation loss carries a
//! seeded oscillation so that later epochs are not always better, which is
//! what makes best-K retention worth having.

use bytes::Bytes;
use runtime_core::{Epoch, Result};
use serde::{Deserialize, Serialize};

use crate::Trainable;

/// Simulated model and optimizer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedModel {
    weights: Vec<f64>,
    velocity: Vec<f64>,
    target: Vec<f64>,
    learning_rate: f64,
    momentum: f64,
    noise: f64,
    seed: u64,
    epochs_trained: u64,
}

impl SimulatedModel {
    /// Create a model with `dim` weights, all starting at zero
    pub fn new(dim: usize, seed: u64) -> Self {
        let target = (0..dim as u64)
            .map(|i| (seed.wrapping_add(i) % 7) as f64 - 3.0)
            .collect();

        Self {
            weights: vec![0.0; dim],
            velocity: vec![0.0; dim],
            target,
            learning_rate: 0.05,
            momentum: 0.9,
            noise: 0.5,
            seed,
            epochs_trained: 0,
        }
    }

    /// Restore from bytes produced by [`Trainable::snapshot`]
    pub fn from_snapshot(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }

    /// Get the number of completed epochs
    pub fn epochs_trained(&self) -> u64 {
        self.epochs_trained
    }

    /// Noise-free distance to the optimum
    pub fn loss(&self) -> f64 {
        0.5 * self
            .weights
            .iter()
            .zip(&self.target)
            .map(|(w, t)| (w - t).powi(2))
            .sum::<f64>()
    }
}

impl Trainable for SimulatedModel {
    fn train_epoch(&mut self, _epoch: Epoch) -> Result<()> {
        for ((w, v), t) in self
            .weights
            .iter_mut()
            .zip(self.velocity.iter_mut())
            .zip(&self.target)
        {
            let grad = *w - t;
            *v = self.momentum * *v + grad;
            *w -= self.learning_rate * *v;
        }
        self.epochs_trained += 1;
        Ok(())
    }

    fn validate(&mut self, epoch: Epoch) -> Result<f64> {
        let phase = (self.seed % 17) as f64 + epoch as f64 * 1.3;
        Ok(self.loss() + self.noise * phase.sin().powi(2))
    }

    fn snapshot(&self, _epoch: Epoch) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }
}
