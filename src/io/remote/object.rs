//! Object-store sink (S3, Azure Blob and friends).
//!
//! The remote folder becomes the key prefix: `/exports/2024-03-01` + `out.csv` is
//! stored as `exports/2024-03-01/out.csv` in the configured bucket.

use std::path::Path;
use tracing::info;

use crate::config::TargetConfig;
use crate::io::remote::traits::{ErrorKind, ObjectIO, RemoteSink, SinkError, SinkResult};
use crate::outputfile::OutputPath;

pub struct ObjectStoreSink<O: ObjectIO> {
    io: O,
    bucket: String,
}

impl<O: ObjectIO> ObjectStoreSink<O> {
    pub fn new(io: O, bucket: impl Into<String>) -> Self {
        Self {
            io,
            bucket: bucket.into(),
        }
    }

    /// Build a sink for `target`, reading the bucket from its `bucket` setting.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidInput`] when the target has no bucket configured.
    pub fn from_target(io: O, target: &TargetConfig) -> SinkResult<Self> {
        let bucket = target
            .setting("bucket")
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| {
                SinkError::new(
                    ErrorKind::InvalidInput,
                    format!("target {} has no bucket configured", target.alias),
                )
            })?;
        Ok(Self::new(io, bucket))
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub fn object_io(&self) -> &O {
        &self.io
    }

    /// Object key for `remote`.
    #[must_use]
    pub fn object_key(remote: &OutputPath) -> String {
        remote.remote_path().trim_start_matches('/').to_string()
    }
}

impl<O: ObjectIO> RemoteSink for ObjectStoreSink<O> {
    fn name(&self) -> &str {
        "object"
    }

    fn upload(&self, local_path: &Path, remote: &OutputPath) -> SinkResult<u64> {
        let key = Self::object_key(remote);
        if key.is_empty() {
            return Err(SinkError::new(ErrorKind::InvalidInput, "empty object key"));
        }
        let data = std::fs::read(local_path)
            .map_err(|e| SinkError::io(format!("read {}", local_path.display()), &e))?;
        self.io.put_object(&self.bucket, &key, &data)?;
        info!(
            sink = self.name(),
            bucket = %self.bucket,
            key = %key,
            bytes = data.len(),
            "uploaded export"
        );
        Ok(data.len() as u64)
    }
}
