//! The streaming export pipeline.
//!
//! [`write_events_to_file`] wraps a record source in an [`EventWriter`]: a pass-through
//! iterator that hands every record back to the caller (so it can still be forwarded
//! downstream or counted) while encoding it into a staging file on the side.
//!
//! # Chunks
//! Search results may arrive in several chunks that make up one logical export. The
//! caller owns an [`ExportSession`] and passes it to every chunk together with a
//! [`ChunkState`]:
//!
//! | chunk            | `append_chunk` | `finish`      |
//! |------------------|----------------|---------------|
//! | single chunk     | `false`        | `None`        |
//! | first of many    | `false`        | `Some(false)` |
//! | middle           | `true`         | `Some(false)` |
//! | last             | `true`         | `Some(true)`  |
//!
//! Headers and the opening `[` of a JSON array are written once per logical export, by
//! the first chunk that resolves the format (and, for delimited output, the column set).
//! A continuation chunk on a session that never saw a starting chunk writes neither.
//! The closing `]` is written only on a terminal chunk. JSON records are
//! separated by `,\n`; the separator after the last record of a non-terminal chunk is
//! written at the start of the next chunk, so the file never holds a dangling comma.
//!
//! # Buffering
//! Encoded fragments are buffered and appended to the staging file every
//! [`BUFFER_FLUSH_COUNT`] fragments and once more when the source is exhausted. The
//! file is opened and closed around each flush.
//!
//! # Cancellation
//! A [`JobMonitor`] is polled before each record. When the search is being torn down and
//! the chunk is not explicitly terminal, the writer stops: buffered fragments are
//! discarded and nothing more is written.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::encode::Encoder;
use crate::fields::{FieldSelector, FieldSpec};
use crate::format::OutputFormat;
use crate::io::compression::Compression;
use crate::io::remote::RemoteSink;
use crate::io::staging::StagingFile;
use crate::outputfile::OutputPath;
use crate::record::Record;

/// Fragments buffered in memory before they are appended to the staging file.
pub const BUFFER_FLUSH_COUNT: usize = 1000;

const JSON_OPEN: &[u8] = b"[";
const JSON_CLOSE: &[u8] = b"]";
const JSON_SEPARATOR: &[u8] = b",\n";

/// Options for one export stream.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Allow-list of field names and glob patterns. `None` keeps every field.
    pub fields: Option<FieldSpec>,
    /// Output format. `None` infers raw or JSON from the first record.
    pub format: Option<OutputFormat>,
    /// Gzip the staging file.
    pub compress: bool,
    /// Keep fields whose value is blank (JSON and KV output).
    pub blank_fields: bool,
    /// Keep Splunk internal fields.
    pub internal_fields: bool,
    /// Keep `date_*` fields.
    pub date_fields: bool,
    /// The output is appended to an existing remote file, so no header is written.
    pub append_data: bool,
    /// Search job identifier, attached to log lines.
    pub search_id: Option<String>,
    pub buffer_flush_count: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            fields: None,
            format: None,
            compress: false,
            blank_fields: false,
            internal_fields: false,
            date_fields: false,
            append_data: false,
            search_id: None,
            buffer_flush_count: BUFFER_FLUSH_COUNT,
        }
    }
}

impl ExportOptions {
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: FieldSpec) -> Self {
        self.fields = Some(fields);
        self
    }

    #[must_use]
    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    fn selector(&self) -> FieldSelector {
        FieldSelector::new(self.fields.clone())
            .internal_fields(self.internal_fields)
            .date_fields(self.date_fields)
    }

    fn search_id(&self) -> &str {
        self.search_id.as_deref().unwrap_or("-")
    }
}

/// Where a chunk sits in a logical export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkState {
    /// This chunk continues an export started by an earlier chunk.
    pub append_chunk: bool,
    /// `Some(true)` for the last chunk, `Some(false)` for an intermediate one. `None`
    /// means the caller does not chunk, and is treated as terminal.
    pub finish: Option<bool>,
}

impl ChunkState {
    /// The whole export in one go.
    #[must_use]
    pub fn single() -> Self {
        Self {
            append_chunk: false,
            finish: None,
        }
    }

    #[must_use]
    pub fn new(append_chunk: bool, finish: Option<bool>) -> Self {
        Self {
            append_chunk,
            finish,
        }
    }

    /// Whether this chunk closes the export.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.finish.unwrap_or(true)
    }
}

/// Polled before each record to learn whether the owning search is being torn down.
pub trait JobMonitor {
    fn is_finalizing(&self) -> bool;
}

impl<F: Fn() -> bool> JobMonitor for F {
    fn is_finalizing(&self) -> bool {
        self()
    }
}

/// A monitor for jobs that are never cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFinalizing;

impl JobMonitor for NeverFinalizing {
    fn is_finalizing(&self) -> bool {
        false
    }
}

/// Counters for one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkSummary {
    /// Records pulled from the source.
    pub records_in: u64,
    /// Records encoded into the staging buffer.
    pub records_written: u64,
    /// Records that could not be encoded and were left out.
    pub records_skipped: u64,
    /// Fragments appended to the staging file, framing included.
    pub fragments: u64,
    pub flushes: u64,
    /// Uncompressed bytes appended to the staging file.
    pub bytes: u64,
    /// The chunk stopped early because the search was finalizing.
    pub cancelled: bool,
}

/// Export state carried from one chunk to the next.
///
/// Create one per logical export and pass it to every chunk. A chunk with
/// `append_chunk == false` starts a new logical export and resets it.
#[derive(Debug, Default)]
pub struct ExportSession {
    format: Option<OutputFormat>,
    selector: Option<FieldSelector>,
    columns: Option<Vec<String>>,
    started: bool,
    opening_written: bool,
    records_in_output: u64,
    chunks: u64,
    totals: ChunkSummary,
    finalized: bool,
}

impl ExportSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The format in use, once it is known.
    #[must_use]
    pub fn format(&self) -> Option<OutputFormat> {
        self.format
    }

    /// Column set of a delimited export.
    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Records encoded into the current logical output across all chunks.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_in_output
    }

    #[must_use]
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Counters summed over every chunk of the current logical output.
    #[must_use]
    pub fn totals(&self) -> ChunkSummary {
        self.totals
    }

    /// Whether a terminal chunk has been written.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn absorb(&mut self, chunk: &ChunkSummary) {
        let t = &mut self.totals;
        t.records_in += chunk.records_in;
        t.records_written += chunk.records_written;
        t.records_skipped += chunk.records_skipped;
        t.fragments += chunk.fragments;
        t.flushes += chunk.flushes;
        t.bytes += chunk.bytes;
        t.cancelled |= chunk.cancelled;
    }
}

/// Stream `records` into the staging file at `local_path`, yielding each record back.
///
/// See the [module documentation](self) for chunk, buffering and cancellation rules.
/// Staging I/O errors are yielded as `Err` and end the iteration.
pub fn write_events_to_file<'s, I, M>(
    records: I,
    options: &'s ExportOptions,
    local_path: impl Into<PathBuf>,
    chunk: ChunkState,
    session: &'s mut ExportSession,
    monitor: M,
) -> EventWriter<'s, I::IntoIter, M>
where
    I: IntoIterator<Item = Record>,
    M: JobMonitor,
{
    let staging = StagingFile::new(local_path, Compression::from_flag(options.compress));
    EventWriter::new(records.into_iter(), options, staging, chunk, session, monitor)
}

/// Upload a finished staging file and remove it.
///
/// The staging file is kept when the upload fails so it can be inspected.
///
/// # Errors
/// Returns the sink error, or an error if the staging file cannot be removed.
pub fn deliver(staging: &StagingFile, sink: &dyn RemoteSink, remote: &OutputPath) -> Result<u64> {
    let bytes = sink.upload(staging.path(), remote).with_context(|| {
        format!(
            "upload {} to {remote} via {}",
            staging.path().display(),
            sink.name()
        )
    })?;
    staging.remove()?;
    Ok(bytes)
}

/// Pass-through iterator that encodes records into a staging file.
pub struct EventWriter<'s, I, M> {
    records: I,
    options: &'s ExportOptions,
    session: &'s mut ExportSession,
    staging: StagingFile,
    chunk: ChunkState,
    monitor: M,
    encoder: Option<Encoder>,
    buffer: Vec<Vec<u8>>,
    summary: ChunkSummary,
    opened: bool,
    done: bool,
}

impl<'s, I, M> EventWriter<'s, I, M>
where
    I: Iterator<Item = Record>,
    M: JobMonitor,
{
    pub fn new(
        records: I,
        options: &'s ExportOptions,
        staging: StagingFile,
        chunk: ChunkState,
        session: &'s mut ExportSession,
        monitor: M,
    ) -> Self {
        if !chunk.append_chunk {
            session.reset();
            session.started = true;
        }
        session.chunks += 1;
        debug!(
            search_id = options.search_id(),
            path = %staging.path().display(),
            format = ?options.format,
            compress = options.compress,
            append_chunk = chunk.append_chunk,
            finish = ?chunk.finish,
            "writing events to staging file"
        );
        Self {
            records,
            options,
            session,
            staging,
            chunk,
            monitor,
            encoder: None,
            buffer: Vec::new(),
            summary: ChunkSummary::default(),
            opened: false,
            done: false,
        }
    }

    /// Counters for this chunk so far.
    #[must_use]
    pub fn summary(&self) -> ChunkSummary {
        self.summary
    }

    #[must_use]
    pub fn staging(&self) -> &StagingFile {
        &self.staging
    }

    /// Run the chunk to completion, discarding the passed-through records.
    ///
    /// # Errors
    /// Returns the first staging I/O error.
    pub fn drain(mut self) -> Result<ChunkSummary> {
        for item in self.by_ref() {
            item?;
        }
        Ok(self.summary)
    }

    /// Resolve the format and column set, and queue the opening framing.
    fn open(&mut self, first: Option<&Record>) -> Result<()> {
        if self.opened {
            return Ok(());
        }
        if self.chunk.append_chunk && self.session.finalized {
            bail!(
                "export for search {} was already finalized; refusing to append",
                self.options.search_id()
            );
        }
        let selector = self
            .session
            .selector
            .get_or_insert_with(|| self.options.selector());

        let format = match (self.session.format, self.options.format, first) {
            (Some(active), Some(requested), _) if active != requested => {
                bail!("output format changed from {active} to {requested} mid-export")
            }
            (Some(active), _, _) => active,
            (None, Some(requested), _) => requested,
            (None, None, Some(record)) => {
                OutputFormat::infer(selector.select(record).into_iter())
            }
            // Nothing to infer from yet.
            (None, None, None) => return Ok(()),
        };
        self.session.format = Some(format);
        self.encoder = Some(Encoder::new(format, self.options.blank_fields));
        self.opened = true;

        if format.is_delimited() && self.session.columns.is_none()
            && let Some(record) = first
        {
            let columns = selector
                .select(record)
                .into_iter()
                .map(String::from)
                .collect();
            self.session.columns = Some(columns);
        }

        if self.session.opening_written || !self.session.started {
            return Ok(());
        }
        match format {
            OutputFormat::Json => self.push(JSON_OPEN.to_vec())?,
            f if f.is_delimited() && !self.options.append_data => {
                // Wait for a record to fix the columns.
                let Some(columns) = self.session.columns.as_deref() else {
                    return Ok(());
                };
                let header = self.encoder.as_ref().and_then(|enc| enc.header(columns));
                if let Some(header) = header {
                    let mut line = header.into_bytes();
                    line.push(b'\n');
                    self.push(line)?;
                }
            }
            _ => {}
        }
        self.session.opening_written = true;
        Ok(())
    }

    fn push(&mut self, fragment: Vec<u8>) -> Result<()> {
        self.buffer.push(fragment);
        if self.buffer.len() >= self.options.buffer_flush_count.max(1) {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let stats = self.staging.append(&self.buffer)?;
        self.buffer.clear();
        self.summary.fragments += stats.fragments as u64;
        self.summary.bytes += stats.bytes;
        self.summary.flushes += 1;
        Ok(())
    }

    fn process(&mut self, record: &Record) -> Result<()> {
        self.summary.records_in += 1;
        self.open(Some(record))?;
        let (Some(encoder), Some(format)) = (self.encoder.as_ref(), self.session.format) else {
            return Ok(());
        };
        let Some(selector) = self.session.selector.as_mut() else {
            return Ok(());
        };

        let encoded = match self.session.columns.as_deref() {
            Some(columns) if format.is_delimited() => {
                let keys: Vec<&str> = columns.iter().map(String::as_str).collect();
                encoder.encode(record, &keys)
            }
            _ => encoder.encode(record, &selector.select(record)),
        };
        let body = match encoded {
            Ok(body) => body,
            Err(error) => {
                warn!(search_id = self.options.search_id(), %error, "skipping record");
                self.summary.records_skipped += 1;
                return Ok(());
            }
        };

        let fragment = if format == OutputFormat::Json {
            if self.session.records_in_output > 0 {
                [JSON_SEPARATOR, body.as_slice()].concat()
            } else {
                body
            }
        } else {
            let mut line = body;
            line.push(b'\n');
            line
        };
        self.session.records_in_output += 1;
        self.summary.records_written += 1;
        self.push(fragment)
    }

    /// Close the chunk: terminal framing, last flush, session bookkeeping.
    fn finalize(&mut self) -> Result<()> {
        self.open(None)?;
        if self.chunk.is_terminal() && self.session.format == Some(OutputFormat::Json) {
            self.buffer.push(JSON_CLOSE.to_vec());
        }
        self.flush()?;
        if self.chunk.is_terminal() {
            self.session.finalized = true;
        }
        self.session.absorb(&self.summary);
        debug!(
            search_id = self.options.search_id(),
            path = %self.staging.path().display(),
            records = self.summary.records_written,
            skipped = self.summary.records_skipped,
            bytes = self.summary.bytes,
            "wrote chunk to staging file"
        );
        if self.chunk.is_terminal() {
            let totals = self.session.totals;
            info!(
                search_id = self.options.search_id(),
                path = %self.staging.path().display(),
                chunks = self.session.chunks,
                records = totals.records_written,
                skipped = totals.records_skipped,
                bytes = totals.bytes,
                "export complete"
            );
        }
        Ok(())
    }

    fn cancel(&mut self) {
        debug!(
            search_id = self.options.search_id(),
            discarded = self.buffer.len(),
            "search is finalizing; stopping export early"
        );
        self.buffer.clear();
        self.summary.cancelled = true;
        self.session.absorb(&self.summary);
    }
}

impl<I, M> Iterator for EventWriter<'_, I, M>
where
    I: Iterator<Item = Record>,
    M: JobMonitor,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.chunk.finish != Some(true) && self.monitor.is_finalizing() {
            self.done = true;
            self.cancel();
            return None;
        }
        match self.records.next() {
            Some(record) => match self.process(&record) {
                Ok(()) => Some(Ok(record)),
                Err(e) => {
                    self.done = true;
                    Some(Err(e))
                }
            },
            None => {
                self.done = true;
                self.finalize().err().map(Err)
            }
        }
    }
}
