//! Local staging files.
//!
//! Export output is written to a local staging file before it is uploaded. The file is
//! reopened in append mode on every flush and closed again straight after, so the same
//! path can be resumed by a later chunk of the same search (or by another process).

use anyhow::{Context, Result};
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::io::compression::Compression;

/// Statistics for one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub fragments: usize,
    /// Uncompressed bytes handed to the codec.
    pub bytes: u64,
}

/// A staging file on local disk.
#[derive(Debug, Clone)]
pub struct StagingFile {
    path: PathBuf,
    compression: Compression,
}

impl StagingFile {
    pub fn new(path: impl Into<PathBuf>, compression: Compression) -> Self {
        Self {
            path: path.into(),
            compression,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Size of the file on disk, 0 when it does not exist yet.
    #[must_use]
    pub fn len_on_disk(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Append `fragments` to the file, creating it (and its parent directory) if needed.
    ///
    /// Gzip files get one new member per call. An empty call still writes an empty
    /// member to a file that has no content yet, so a compressed export with no records
    /// is a valid gzip file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, written or closed.
    pub fn append(&self, fragments: &[Vec<u8>]) -> Result<FlushStats> {
        let path = &self.path;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let empty_file = self.len_on_disk() == 0;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open {} for append", path.display()))?;

        if fragments.is_empty() && !(self.compression.is_compressed() && empty_file) {
            return Ok(FlushStats::default());
        }

        let mut w = self
            .compression
            .wrap_writer(file)
            .with_context(|| format!("setup compression for {}", path.display()))?;
        let mut bytes = 0u64;
        for fragment in fragments {
            w.write_all(fragment)
                .with_context(|| format!("write {}", path.display()))?;
            bytes += fragment.len() as u64;
        }
        w.finish()
            .with_context(|| format!("close {}", path.display()))?;

        debug!(
            path = %path.display(),
            fragments = fragments.len(),
            bytes,
            compression = ?self.compression,
            "flushed staging buffer"
        );
        Ok(FlushStats {
            fragments: fragments.len(),
            bytes,
        })
    }

    /// Delete the file. A missing file is not an error.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", self.path.display())),
        }
    }
}
