//! Local filesystem storage backend
//!
//! Artifacts are written to a temporary sibling and renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use runtime_core::{Error, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::StorageBackend;

/// Local filesystem storage backend rooted at a run directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Get the base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Hidden, uniquely named sibling of the target
    fn staging_path(target: &Path) -> PathBuf {
        let name = target.file_name().unwrap_or_default().to_string_lossy();
        target.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
    }

    fn storage_error(action: &str, path: &Path, e: std::io::Error) -> Error {
        Error::Storage {
            message: format!("Failed to {} {}: {}", action, path.display(), e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    #[instrument(skip(self), fields(backend = "local"))]
    async fn read(&self, path: &str) -> Result<Bytes> {
        let target = self.resolve(path);

        match fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::StoragePathNotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(Self::storage_error("read", &target, e)),
        }
    }

    #[instrument(skip(self, data), fields(backend = "local", size = data.len()))]
    async fn write(&self, path: &str, data: Bytes) -> Result<u64> {
        let target = self.resolve(path);
        let staging = Self::staging_path(&target);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::storage_error("create directory", parent, e))?;
        }

        let mut file = fs::File::create(&staging)
            .await
            .map_err(|e| Self::storage_error("create", &staging, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| Self::storage_error("write", &staging, e))?;
        file.sync_all()
            .await
            .map_err(|e| Self::storage_error("sync", &staging, e))?;
        drop(file);

        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(Self::storage_error("rename into", &target, e));
        }

        debug!(path = %target.display(), size = data.len(), "Artifact written");
        Ok(data.len() as u64)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path);

        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path = %target.display(), "Artifact deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::StoragePathNotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(Self::storage_error("delete", &target, e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::metadata(self.resolve(path)).await.is_ok())
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut results = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            while let Ok(Some(entry)) = entries.next_entry().await {
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                let entry_path = entry.path();
                if file_type.is_dir() {
                    pending.push(entry_path);
                    continue;
                }
                if let Ok(relative) = entry_path.strip_prefix(&self.base_path) {
                    let relative = relative.to_string_lossy().to_string();
                    if relative.starts_with(prefix) && !relative.ends_with(".tmp") {
                        results.push(relative);
                    }
                }
            }
        }

        results.sort();
        Ok(results)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn copy(&self, from: &str, to: &str) -> Result<u64> {
        let source = self.resolve(from);
        if fs::metadata(&source).await.is_err() {
            return Err(Error::StoragePathNotFound {
                path: from.to_string(),
            });
        }

        // Stage then rename so the alias never appears half-written
        let target = self.resolve(to);
        let staging = Self::staging_path(&target);
        let size = fs::copy(&source, &staging)
            .await
            .map_err(|e| Self::storage_error("copy", &source, e))?;
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(Self::storage_error("rename into", &target, e));
        }

        debug!(from = %source.display(), to = %target.display(), size, "Artifact copied");
        Ok(size)
    }

    fn locate(&self, path: &str) -> String {
        let target = self.resolve(path);
        std::path::absolute(&target)
            .unwrap_or(target)
            .to_string_lossy()
            .to_string()
    }
}
