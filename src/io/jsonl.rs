//! JSON Lines record source.
//!
//! Each non-empty line is one JSON object and becomes one [`Record`]. Gzip input is
//! detected from the path or the magic bytes and decoded transparently.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::io::compression::auto_detect_reader;
use crate::record::Record;

/// Streaming reader over JSONL records.
///
/// Yields `Err` for a line that cannot be read or parsed; iteration may continue past a
/// parse error.
pub struct JsonlRecords<R> {
    lines: std::io::Lines<BufReader<R>>,
    origin: String,
    line_no: usize,
}

impl<R: Read> Iterator for JsonlRecords<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line
                .with_context(|| format!("read line {} in {}", self.line_no, self.origin))
            {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).with_context(|| {
                format!("parse JSONL line {} in {}: {}", self.line_no, self.origin, line)
            }));
        }
    }
}

/// Read records from any reader. `origin` names the input in error messages.
pub fn read_records<R: Read>(reader: R, origin: impl Into<String>) -> JsonlRecords<R> {
    JsonlRecords {
        lines: BufReader::new(reader).lines(),
        origin: origin.into(),
        line_no: 0,
    }
}

/// Open a JSONL file (optionally gzip) for streaming.
///
/// # Errors
/// Returns an error if the file cannot be opened or its compression set up.
pub fn read_records_path(path: impl AsRef<Path>) -> Result<JsonlRecords<Box<dyn Read>>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = auto_detect_reader(f, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    Ok(read_records(rdr, path.display().to_string()))
}

/// Read a whole JSONL file into memory.
///
/// # Errors
/// Returns the first read or parse error, with its line number.
pub fn read_records_vec(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    read_records_path(path)?.collect()
}
