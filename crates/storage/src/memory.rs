//! In-process storage backend
//!
//! Keeps artifacts in a map and can be told to fail writes or deletes, which
//! makes it the backend of choice for exercising retention error paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use runtime_core::{Error, Result};

use crate::StorageBackend;

/// In-memory storage backend with fault injection
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<BTreeMap<String, Bytes>>,
    /// Writes to paths with this prefix fail
    fail_writes: RwLock<Option<String>>,
    fail_deletes: AtomicBool,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStorage {
    /// Create an empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail.then(String::new);
    }

    /// Make subsequent writes to paths starting with `prefix` fail
    pub fn fail_writes_under(&self, prefix: &str) {
        *self.fail_writes.write() = Some(prefix.to_string());
    }

    /// Make every subsequent delete fail
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Successful deletes so far
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Stored paths, sorted
    pub fn paths(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn read(&self, path: &str) -> Result<Bytes> {
        self.objects
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::StoragePathNotFound {
                path: path.to_string(),
            })
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<u64> {
        let failing = self
            .fail_writes
            .read()
            .as_deref()
            .is_some_and(|prefix| path.starts_with(prefix));
        if failing {
            return Err(Error::Storage {
                message: format!("injected write failure for {}", path),
            });
        }

        let size = data.len() as u64;
        self.objects.write().insert(path.to_string(), data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(size)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Storage {
                message: format!("injected delete failure for {}", path),
            });
        }

        match self.objects.write().remove(path) {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(Error::StoragePathNotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.read().contains_key(path))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
