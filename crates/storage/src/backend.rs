//! Storage backend trait definition
//!
//! Defines the async interface that checkpoint artifacts are persisted
//! through.

use async_trait::async_trait;
use bytes::Bytes;
use runtime_core::Result;

/// Async trait for storage backends
///
/// Paths are relative to the backend root. A backend owns every artifact
/// written through it until it is deleted.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read data from the given path
    ///
    /// # Errors
    /// `StoragePathNotFound` if nothing is stored at `path`
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Write data to the given path, replacing any previous content
    ///
    /// Writes are atomic: readers see either the old content or the new
    /// content, never a partial file.
    ///
    /// # Returns
    /// Number of bytes written
    async fn write(&self, path: &str, data: Bytes) -> Result<u64>;

    /// Delete data at the given path
    ///
    /// # Errors
    /// `StoragePathNotFound` if nothing is stored at `path`
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if a path exists
    async fn exists(&self, path: &str) -> Result<bool>;

    /// List all paths under a given prefix, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Copy the artifact at `from` to `to`
    ///
    /// The default reads the whole artifact and writes it back.
    async fn copy(&self, from: &str, to: &str) -> Result<u64> {
        let data = self.read(from).await?;
        self.write(to, data).await
    }

    /// Absolute location of `path`, for reporting to users
    fn locate(&self, path: &str) -> String {
        path.to_string()
    }
}
