//! Runtime Core - shared foundation for checkpoint retention
//!
//! Provides the score and entry types, the workspace error type, and run
//! configuration used by the checkpoint, storage and trainer crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CheckpointConfig, ExperimentConfig, RunConfig};
pub use error::{Error, Result};
pub use types::*;
