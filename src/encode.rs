//! Per-record encoders.
//!
//! An [`Encoder`] is chosen once per stream from the active [`OutputFormat`] and turns one
//! record into its textual form. Encoders never append the record terminator; framing
//! (newlines, JSON separators and brackets) belongs to the export writer in
//! [`crate::export`].

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use std::io;
use thiserror::Error;
use tracing::warn;

use crate::format::OutputFormat;
use crate::record::{FieldValue, Record};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("raw output selected but the record has no _raw field")]
    MissingRaw,
}

/// JSON formatter that separates keys from values with `": "` and members with `", "`,
/// the layout Splunk users expect from exported JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

fn write_json<T: Serialize + ?Sized>(buf: &mut Vec<u8>, value: &T) -> serde_json::Result<()> {
    let mut ser = Serializer::with_formatter(buf, SpacedFormatter);
    value.serialize(&mut ser)
}

/// Backslash-escape double quotes. A quote that is already escaped (`\"`) gets its
/// backslash escaped as well, yielding `\\\"`.
#[must_use]
pub fn escape_quotes(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut prev_backslash = false;
    for c in value.chars() {
        if c == '"' {
            out.push_str(if prev_backslash { r#"\\""# } else { r#"\""# });
        } else {
            out.push(c);
        }
        prev_backslash = c == '\\';
    }
    out
}

/// RFC 4180 quoting: wrap in quotes and double any embedded quote.
#[must_use]
pub fn rfc4180_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_needs_quotes(value: &str, delimiter: char) -> bool {
    value.contains(|c: char| c == delimiter || matches!(c, ' ' | '"' | '\n' | '\r'))
}

/// Record encoder for one output format.
#[derive(Debug, Clone)]
pub enum Encoder {
    Raw,
    Kv { blank_fields: bool },
    Delimited { format: OutputFormat, delimiter: char },
    Json { blank_fields: bool },
}

impl Encoder {
    #[must_use]
    pub fn new(format: OutputFormat, blank_fields: bool) -> Self {
        match format {
            OutputFormat::Raw => Self::Raw,
            OutputFormat::Kv => Self::Kv { blank_fields },
            OutputFormat::Csv | OutputFormat::Tsv | OutputFormat::Pipe => Self::Delimited {
                format,
                delimiter: format.delimiter().unwrap_or(','),
            },
            OutputFormat::Json => Self::Json { blank_fields },
        }
    }

    /// Header row for delimited formats, `None` for the rest.
    #[must_use]
    pub fn header(&self, columns: &[String]) -> Option<String> {
        let Self::Delimited { format, delimiter } = self else {
            return None;
        };
        let names: Vec<String> = columns
            .iter()
            .map(|name| {
                if *format == OutputFormat::Csv && csv_needs_quotes(name, *delimiter) {
                    rfc4180_quote(name)
                } else {
                    name.clone()
                }
            })
            .collect();
        Some(names.join(delimiter.to_string().as_str()))
    }

    /// Encode one record, restricted to `keys`, without a trailing terminator.
    ///
    /// For delimited formats `keys` is the fixed column set of the stream and absent
    /// fields become empty cells.
    ///
    /// # Errors
    /// [`EncodeError::MissingRaw`] when raw output meets a record without `_raw`.
    pub fn encode(&self, record: &Record, keys: &[&str]) -> Result<Vec<u8>, EncodeError> {
        match self {
            Self::Raw => record
                .raw()
                .filter(|_| keys.contains(&"_raw"))
                .map(|raw| raw.as_bytes().to_vec())
                .ok_or(EncodeError::MissingRaw),
            Self::Kv { blank_fields } => Ok(encode_kv(record, keys, *blank_fields).into_bytes()),
            Self::Delimited { format, delimiter } => {
                Ok(encode_row(record, keys, *format, *delimiter).into_bytes())
            }
            Self::Json { blank_fields } => Ok(encode_json(record, keys, *blank_fields)),
        }
    }
}

fn encode_kv(record: &Record, keys: &[&str], blank_fields: bool) -> String {
    let mut pairs = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(value) = record.get(key) else {
            continue;
        };
        if !blank_fields && value.is_blank() {
            continue;
        }
        let text = value.to_text(",");
        let rendered = if text.contains('"') {
            format!("\"{}\"", escape_quotes(&text))
        } else if text.contains([' ', '=']) {
            format!("\"{text}\"")
        } else {
            text.into_owned()
        };
        pairs.push(format!("{key}={rendered}"));
    }
    pairs.join(" ")
}

fn encode_cell(value: &FieldValue, format: OutputFormat, delimiter: char) -> String {
    let sep = delimiter.to_string();
    match value {
        FieldValue::List(values) => {
            let joined = values.join(sep.as_str());
            if format == OutputFormat::Csv {
                rfc4180_quote(&joined)
            } else {
                format!("\"{}\"", joined.replace('"', "\\\""))
            }
        }
        other => {
            let text = other.to_text(&sep);
            if format == OutputFormat::Csv && csv_needs_quotes(&text, delimiter) {
                rfc4180_quote(&text)
            } else {
                text.into_owned()
            }
        }
    }
}

fn encode_row(record: &Record, columns: &[&str], format: OutputFormat, delimiter: char) -> String {
    columns
        .iter()
        .map(|col| {
            record
                .get(col)
                .map(|v| encode_cell(v, format, delimiter))
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(delimiter.to_string().as_str())
}

fn encode_member(key: &str, value: &FieldValue) -> serde_json::Result<Vec<u8>> {
    let mut member = Vec::new();
    write_json(&mut member, key)?;
    member.extend_from_slice(b": ");
    write_json(&mut member, value)?;
    Ok(member)
}

fn encode_json(record: &Record, keys: &[&str], blank_fields: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.push(b'{');
    let mut first = true;
    for key in keys {
        let Some(value) = record.get(key) else {
            continue;
        };
        if !blank_fields && value.is_blank() {
            continue;
        }
        match encode_member(key, value) {
            Ok(member) => {
                if !first {
                    out.extend_from_slice(b", ");
                }
                out.extend_from_slice(&member);
                first = false;
            }
            Err(error) => warn!(field = %key, %error, "dropping field that failed to encode"),
        }
    }
    out.push(b'}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn escape_quotes_handles_escaped_and_bare() {
        assert_eq!(escape_quotes(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_quotes(r#"a\"b"#), r#"a\\\"b"#);
        assert_eq!(escape_quotes("plain"), "plain");
    }

    #[test]
    fn json_uses_spaced_separators() {
        let r = record! { "a" => 1, "b" => vec!["x", "y"] };
        let out = Encoder::new(OutputFormat::Json, false)
            .encode(&r, &["a", "b"])
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"{"a": 1, "b": ["x", "y"]}"#);
    }

    #[test]
    fn raw_without_raw_field_is_an_error() {
        let r = record! { "host" => "web01" };
        let err = Encoder::new(OutputFormat::Raw, false).encode(&r, &["host"]);
        assert!(matches!(err, Err(EncodeError::MissingRaw)));
    }
}
