//! Fake implementations for testing.
//!
//! In-memory stand-ins for object stores and HEC endpoints, so upload paths can be
//! exercised without network access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::io::remote::traits::{
    ErrorKind, HecTransport, ObjectIO, ObjectMetadata, SinkError, SinkResult,
};

type BucketStorage = Arc<Mutex<HashMap<String, HashMap<String, Vec<u8>>>>>;

fn lock<T>(m: &Mutex<T>) -> SinkResult<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| SinkError::new(ErrorKind::Other, "fake storage mutex poisoned"))
}

// ============================================================================
// FakeObjectIO
// ============================================================================

/// In-memory object store. Clones share the same storage.
#[derive(Clone, Default)]
pub struct FakeObjectIO {
    storage: BucketStorage,
}

impl FakeObjectIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bucket. Uploads to a bucket that was never created fail.
    ///
    /// # Errors
    /// Fails only if the storage lock is poisoned.
    pub fn create_bucket(&self, bucket: &str) -> SinkResult<()> {
        lock(&self.storage)?.entry(bucket.to_string()).or_default();
        Ok(())
    }
}

impl ObjectIO for FakeObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> SinkResult<()> {
        let mut storage = lock(&self.storage)?;
        let bucket_map = storage.get_mut(bucket).ok_or_else(|| {
            SinkError::new(ErrorKind::NotFound, format!("bucket {bucket} not found"))
        })?;
        bucket_map.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> SinkResult<Vec<u8>> {
        let storage = lock(&self.storage)?;
        storage
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| {
                SinkError::new(ErrorKind::NotFound, format!("object {bucket}/{key} not found"))
            })
    }

    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> SinkResult<Vec<ObjectMetadata>> {
        let storage = lock(&self.storage)?;
        let bucket_map = storage.get(bucket).ok_or_else(|| {
            SinkError::new(ErrorKind::NotFound, format!("bucket {bucket} not found"))
        })?;

        let mut objects: Vec<ObjectMetadata> = bucket_map
            .iter()
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .map(|(key, data)| ObjectMetadata {
                key: key.clone(),
                size: data.len() as u64,
                etag: Some(format!("etag-{key}")),
            })
            .collect();

        drop(storage);
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn object_exists(&self, bucket: &str, key: &str) -> SinkResult<bool> {
        let storage = lock(&self.storage)?;
        Ok(storage.get(bucket).is_some_and(|b| b.contains_key(key)))
    }
}

// ============================================================================
// FakeHecTransport
// ============================================================================

/// Records every batch it is given. Clones share the same log.
#[derive(Clone, Default)]
pub struct FakeHecTransport {
    batches: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl FakeHecTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that rejects every batch.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Batches received so far.
    #[must_use]
    pub fn batches(&self) -> Vec<String> {
        lock(&self.batches).map(|b| b.clone()).unwrap_or_default()
    }

    /// Individual events received so far, one JSON object each.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.batches()
            .iter()
            .flat_map(|b| b.lines().map(String::from).collect::<Vec<_>>())
            .collect()
    }
}

impl HecTransport for FakeHecTransport {
    fn send(&mut self, batch: &str) -> SinkResult<()> {
        if self.fail {
            return Err(SinkError::new(ErrorKind::Network, "HEC endpoint unreachable"));
        }
        lock(&self.batches)?.push(batch.to_string());
        Ok(())
    }
}
