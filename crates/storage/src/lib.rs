//! Storage - backends that checkpoint artifacts are persisted through
//!
//! - `LocalStorage`: a run directory on the local filesystem
//! - `MemoryStorage`: an in-process map with fault injection
//!
//! # Example
//!
//! ```no_run
//! use storage::{StorageBackend, LocalStorage};
//! use bytes::Bytes;
//!
//! # async fn example() -> runtime_core::Result<()> {
//! let storage = LocalStorage::new("/tmp/run");
//! storage.write("chk-0001.ckpt", Bytes::from(vec![1, 2, 3])).await?;
//! storage.copy("chk-0001.ckpt", "best_chk.ckpt").await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod local;
mod memory;

pub use backend::StorageBackend;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
