//! # Export Everything
//!
//! Streams search results into export files and hands the finished files to remote
//! destinations.
//!
//! Records flow through a pass-through pipeline: every record is handed back to the
//! caller unchanged while it is encoded into a local staging file. Once the last chunk
//! of a search has been written, the staging file is uploaded to a [`RemoteSink`].
//!
//! ## Key Features
//!
//! - **Six output formats** - raw `_raw` text, `key=value`, CSV, TSV, pipe-delimited and
//!   a single JSON array
//! - **Field selection** - allow-lists with glob patterns, and default stripping of
//!   Splunk internal and `date_*` fields
//! - **Chunked delivery** - one logical export may span many invocations; headers, JSON
//!   brackets and separators are written exactly once
//! - **Gzip** - one gzip member per buffer flush, readable by any gzip tool
//! - **Output path templates** - default folders and `__now__`-style time keywords
//! - **Remote sinks** - directory trees, object stores and HTTP Event Collector
//!
//! ## Quick Start
//!
//! ```
//! use export_everything::{
//!     ChunkState, ExportOptions, ExportSession, NeverFinalizing, OutputFormat, record,
//!     write_events_to_file,
//! };
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("out.csv");
//! let options = ExportOptions::default().with_format(OutputFormat::Csv);
//! let mut session = ExportSession::new();
//!
//! let records = vec![record! { "a" => "1", "b" => "x,y" }];
//! let summary = write_events_to_file(
//!     records,
//!     &options,
//!     &path,
//!     ChunkState::single(),
//!     &mut session,
//!     NeverFinalizing,
//! )
//! .drain()?;
//!
//! assert_eq!(summary.records_written, 1);
//! assert_eq!(std::fs::read_to_string(&path)?, "a,b\n1,\"x,y\"\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`record`] - the record type and the [`record!`] macro
//! - [`fields`] - field selection
//! - [`format`] and [`encode`] - output formats and per-record encoders
//! - [`export`] - the buffered, chunk-aware export pipeline
//! - [`outputfile`] - output path resolution and time keywords
//! - [`config`] - export target configuration
//! - [`io`] - staging files, compression, JSONL input and remote sinks

pub mod config;
pub mod encode;
pub mod export;
pub mod fields;
pub mod format;
pub mod io;
pub mod outputfile;
pub mod record;

// General re-exports
pub use config::{AppConfig, ConfigError, TargetConfig, get_config_from_alias};
pub use encode::{EncodeError, Encoder};
pub use export::{
    BUFFER_FLUSH_COUNT, ChunkState, ChunkSummary, EventWriter, ExportOptions, ExportSession,
    JobMonitor, NeverFinalizing, deliver, write_events_to_file,
};
pub use fields::{FieldSelector, FieldSpec};
pub use format::{FormatError, OutputFormat};
pub use io::compression::Compression;
pub use io::jsonl::{read_records, read_records_path};
pub use io::remote::{LocalDirSink, ObjectStoreSink, RemoteSink, SinkError, SinkResult};
pub use io::staging::StagingFile;
pub use outputfile::{
    OutputPath, apply_compression_suffix, default_filename, parse_outputfile, replace_keywords,
};
pub use record::{FieldValue, Record};
