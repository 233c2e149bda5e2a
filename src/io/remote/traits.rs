//! Core traits for remote destinations.
//!
//! These are synchronous interfaces. Upload happens once per export, after the terminal
//! chunk, and is never retried.

use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::outputfile::OutputPath;

// ============================================================================
// Core Error Type
// ============================================================================

/// Error returned by remote sinks.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct SinkError {
    pub kind: ErrorKind,
    pub message: String,
    /// Underlying error text, when the failure wraps another error.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    InvalidInput,
    Network,
    Io,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Authentication => "authentication failed",
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::InvalidInput => "invalid input",
            Self::Network => "network error",
            Self::Io => "i/o error",
            Self::Other => "error",
        };
        f.write_str(s)
    }
}

impl SinkError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Wrap an I/O error, keeping its kind where one maps.
    pub fn io(message: impl Into<String>, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            std::io::ErrorKind::InvalidInput => ErrorKind::InvalidInput,
            _ => ErrorKind::Io,
        };
        Self::new(kind, message).with_detail(err.to_string())
    }
}

pub type SinkResult<T> = Result<T, SinkError>;

// ============================================================================
// RemoteSink - File Destinations
// ============================================================================

/// A destination that receives a finished staging file.
pub trait RemoteSink {
    /// Short name for log lines (`"local"`, `"s3"`, ...).
    fn name(&self) -> &str;

    /// Upload `local_path` to `remote`, returning the number of bytes transferred.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging file cannot be read, the destination folder cannot
    /// be created, or the transfer fails
    fn upload(&self, local_path: &Path, remote: &OutputPath) -> SinkResult<u64>;
}

// ============================================================================
// ObjectIO - Object Storage
// ============================================================================

/// Metadata for an object in storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
}

/// Trait for object storage operations
pub trait ObjectIO: Send + Sync {
    /// Upload data to object storage
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the upload fails
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> SinkResult<()>;

    /// Download data from object storage
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist, permissions are not enough, or the download fails
    fn get_object(&self, bucket: &str, key: &str) -> SinkResult<Vec<u8>>;

    /// List objects with a prefix
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the listing fails
    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> SinkResult<Vec<ObjectMetadata>>;

    /// Check if an object exists
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the check fails
    fn object_exists(&self, bucket: &str, key: &str) -> SinkResult<bool>;
}

// ============================================================================
// HecTransport - HTTP Event Collector
// ============================================================================

/// Delivers batches of HTTP Event Collector payloads.
pub trait HecTransport {
    /// Send one batch: newline-separated JSON event objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint rejects the batch or cannot be reached
    fn send(&mut self, batch: &str) -> SinkResult<()>;
}
