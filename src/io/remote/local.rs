//! Directory-rooted sink.
//!
//! Treats a local (or mounted) directory as the remote file system. Remote folders are
//! resolved under the root whether they are absolute or relative.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::io::remote::traits::{ErrorKind, RemoteSink, SinkError, SinkResult};
use crate::outputfile::OutputPath;

#[derive(Debug, Clone)]
pub struct LocalDirSink {
    root: PathBuf,
}

impl LocalDirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `remote` lands on disk.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidInput`] for `.`/`..` segments or an unusable filename.
    pub fn resolve(&self, remote: &OutputPath) -> SinkResult<PathBuf> {
        let mut path = self.root.clone();
        for segment in remote.folder_segments() {
            check_segment(segment)?;
            path.push(segment);
        }
        check_segment(&remote.filename)?;
        path.push(&remote.filename);
        Ok(path)
    }

    /// Create the folders of `remote` one level at a time, returning the innermost.
    fn ensure_folder(&self, remote: &OutputPath) -> SinkResult<PathBuf> {
        let mut dir = self.root.clone();
        for segment in remote.folder_segments() {
            check_segment(segment)?;
            dir.push(segment);
            if dir.is_dir() {
                continue;
            }
            match fs::create_dir(&dir) {
                Ok(()) => debug!(folder = %dir.display(), "created remote folder"),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => {
                    return Err(SinkError::io(
                        format!("create folder {}", dir.display()),
                        &e,
                    ));
                }
            }
        }
        Ok(dir)
    }
}

fn check_segment(segment: &str) -> SinkResult<()> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains(['/', '\\'])
    {
        return Err(SinkError::new(
            ErrorKind::InvalidInput,
            format!("invalid remote path segment `{segment}`"),
        ));
    }
    Ok(())
}

impl RemoteSink for LocalDirSink {
    fn name(&self) -> &str {
        "local"
    }

    fn upload(&self, local_path: &Path, remote: &OutputPath) -> SinkResult<u64> {
        check_segment(&remote.filename)?;
        let dir = self.ensure_folder(remote)?;
        let target = dir.join(&remote.filename);

        let mut src = fs::File::open(local_path)
            .map_err(|e| SinkError::io(format!("open {}", local_path.display()), &e))?;
        // Written under a temporary name in the destination folder, then renamed.
        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| SinkError::io(format!("create temp file in {}", dir.display()), &e))?;
        let bytes = io::copy(&mut src, tmp.as_file_mut())
            .map_err(|e| SinkError::io(format!("copy to {}", target.display()), &e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| SinkError::io(format!("sync {}", target.display()), &e))?;
        tmp.persist(&target)
            .map_err(|e| SinkError::io(format!("rename into {}", target.display()), &e.error))?;

        info!(sink = self.name(), path = %target.display(), bytes, "uploaded export");
        Ok(bytes)
    }
}
