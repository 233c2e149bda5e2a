//! Compression support for staging files.
//!
//! Staging files are either plain text or gzip. Gzip output is written in *append*
//! mode: every flush of the export buffer appends one complete gzip member to the file.
//! RFC 1952 allows members to be concatenated, so the finished file is a valid gzip
//! stream and any multi-member decoder (`gzip -d`, [`flate2::read::MultiGzDecoder`])
//! yields the same bytes the plain path would have produced.
//!
//! ## Detection
//! [`Compression::from_path`] looks at the file extension; [`auto_detect_reader`] checks
//! the extension first and falls back to the gzip magic bytes.
//!
//! ## Feature flags
//! The gzip codec is behind `compression-gzip` (on by default). Without it, asking for
//! gzip is an error rather than a silent plain write.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression applied to a staging file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    /// `Gzip` when `enabled`, `None` otherwise.
    #[must_use]
    pub fn from_flag(enabled: bool) -> Self {
        if enabled { Self::Gzip } else { Self::None }
    }

    #[must_use]
    pub fn is_compressed(self) -> bool {
        self != Self::None
    }

    /// File extension carried by compressed output, with the leading dot.
    #[must_use]
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some(".gz"),
        }
    }

    /// Detect compression from a path's extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let lower = path.as_ref().to_string_lossy().to_lowercase();
        if lower.ends_with(".gz") || lower.ends_with(".gzip") {
            Self::Gzip
        } else {
            Self::None
        }
    }

    /// Wrap an append-mode file with this codec.
    ///
    /// # Errors
    /// Fails when gzip is requested but the `compression-gzip` feature is disabled.
    pub fn wrap_writer(self, file: File) -> Result<EncodedWriter> {
        let buffered = BufWriter::new(file);
        match self {
            Self::None => Ok(EncodedWriter::Plain(buffered)),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Ok(EncodedWriter::Gzip(flate2::write::GzEncoder::new(
                buffered,
                flate2::Compression::default(),
            ))),
            #[cfg(not(feature = "compression-gzip"))]
            Self::Gzip => anyhow::bail!("gzip requested but the compression-gzip feature is disabled"),
        }
    }
}

/// A writer over a staging file that must be explicitly finished so the gzip trailer
/// reaches the disk.
pub enum EncodedWriter {
    Plain(BufWriter<File>),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<BufWriter<File>>),
}

impl EncodedWriter {
    /// Write the codec trailer (if any) and flush everything to the file.
    ///
    /// # Errors
    /// Propagates any I/O error from the underlying file.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip(enc) => enc.finish()?.flush(),
        }
    }
}

impl Write for EncodedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip(w) => w.flush(),
        }
    }
}

fn starts_with_gzip_magic<R: BufRead>(reader: &mut R) -> bool {
    reader
        .fill_buf()
        .map(|buf| buf.starts_with(&GZIP_MAGIC))
        .unwrap_or(false)
}

/// Wrap a reader with decompression if the path or the content says it is gzip.
///
/// Detection strategy:
/// 1. Check the file extension (fast path)
/// 2. Fall back to the gzip magic bytes
/// 3. Return the buffered reader unchanged
///
/// Multi-member gzip files are decoded in full.
///
/// # Errors
/// Fails when gzip content is found but the `compression-gzip` feature is disabled.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    let mut buf_reader = BufReader::new(reader);
    let gzip = Compression::from_path(&path_hint) == Compression::Gzip
        || starts_with_gzip_magic(&mut buf_reader);
    if !gzip {
        return Ok(Box::new(buf_reader));
    }
    #[cfg(feature = "compression-gzip")]
    {
        Ok(Box::new(flate2::read::MultiGzDecoder::new(buf_reader)))
    }
    #[cfg(not(feature = "compression-gzip"))]
    {
        anyhow::bail!(
            "{} is gzip but the compression-gzip feature is disabled",
            path_hint.as_ref().display()
        )
    }
}

/// Read a staging file back as text, decompressing when needed.
///
/// # Errors
/// Returns an error if the file cannot be opened, decoded, or is not UTF-8.
pub fn read_to_string(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut rdr = auto_detect_reader(f, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    let mut out = String::new();
    rdr.read_to_string(&mut out)
        .with_context(|| format!("read {}", path.display()))?;
    Ok(out)
}
