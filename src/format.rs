//! Output formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The encoding used for an export file. Exactly one is active per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The `_raw` field, one event per line.
    Raw,
    /// `key=value` pairs.
    Kv,
    /// Comma-separated values with a header row.
    Csv,
    /// Tab-separated values with a header row.
    Tsv,
    /// Pipe-separated values with a header row.
    Pipe,
    /// A single JSON array of objects.
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown output format `{0}` (expected raw, kv, csv, tsv, pipe or json)")]
pub struct FormatError(pub String);

impl OutputFormat {
    pub const ALL: [Self; 6] = [
        Self::Raw,
        Self::Kv,
        Self::Csv,
        Self::Tsv,
        Self::Pipe,
        Self::Json,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Kv => "kv",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Pipe => "pipe",
            Self::Json => "json",
        }
    }

    /// Column delimiter for the delimited formats.
    #[must_use]
    pub fn delimiter(self) -> Option<char> {
        match self {
            Self::Csv => Some(','),
            Self::Tsv => Some('\t'),
            Self::Pipe => Some('|'),
            Self::Raw | Self::Kv | Self::Json => None,
        }
    }

    #[must_use]
    pub fn is_delimited(self) -> bool {
        self.delimiter().is_some()
    }

    /// Extension used when building a default export filename.
    #[must_use]
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Raw | Self::Kv | Self::Pipe => ".log",
            Self::Csv => ".csv",
            Self::Tsv => ".tsv",
            Self::Json => ".json",
        }
    }

    /// Pick a format for a stream that did not request one: raw when the first
    /// record's selected keys include `_raw`, JSON otherwise.
    pub fn infer<'a>(mut selected_keys: impl Iterator<Item = &'a str>) -> Self {
        if selected_keys.any(|k| k == "_raw") {
            Self::Raw
        } else {
            Self::Json
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| FormatError(s.to_string()))
    }
}
