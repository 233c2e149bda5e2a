//! HTTP Event Collector payloads.
//!
//! Records are turned into HEC event objects by a [`HecEventBuilder`] and sent in
//! batches by a [`HecBatcher`] over any [`HecTransport`].
//!
//! Payload rules:
//! - `_time` is moved to the top-level `time` key; records without one get the current
//!   time in epoch seconds.
//! - `host`, `source`, `sourcetype` and `index` are either literal strings or `$field$`
//!   references. A referenced field is taken out of the event body.
//! - The event body is the `_raw` text when the record has one, otherwise an object of
//!   the remaining fields.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::io::remote::traits::{ErrorKind, HecTransport, SinkError, SinkResult};
use crate::record::{FieldValue, Record};

/// Events per batch unless configured otherwise.
pub const DEFAULT_HEC_BATCH_SIZE: usize = 100;

/// A metadata value: a literal, or a reference to a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Literal(String),
    Field(String),
}

impl MetaValue {
    /// `$name$` is a field reference, anything else is literal.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix('$').and_then(|t| t.strip_suffix('$')) {
            Some(name) if !name.is_empty() => Self::Field(name.to_string()),
            _ => Self::Literal(text.to_string()),
        }
    }

    fn take(&self, fields: &mut Record) -> Option<String> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Field(name) => fields
                .remove(name)
                .filter(|v| !v.is_blank())
                .map(|v| v.to_text(",").into_owned()),
        }
    }
}

/// One HEC event object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HecEvent {
    pub time: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    pub event: Value,
}

/// Builds [`HecEvent`]s from records.
#[derive(Debug, Clone)]
pub struct HecEventBuilder {
    host: MetaValue,
    source: MetaValue,
    sourcetype: MetaValue,
    index: MetaValue,
    fallback_host: Option<String>,
}

impl Default for HecEventBuilder {
    fn default() -> Self {
        Self {
            host: MetaValue::parse("$host$"),
            source: MetaValue::parse("$source$"),
            sourcetype: MetaValue::parse("$sourcetype$"),
            index: MetaValue::parse("$index$"),
            fallback_host: None,
        }
    }
}

impl HecEventBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, value: &str) -> Self {
        self.host = MetaValue::parse(value);
        self
    }

    #[must_use]
    pub fn source(mut self, value: &str) -> Self {
        self.source = MetaValue::parse(value);
        self
    }

    #[must_use]
    pub fn sourcetype(mut self, value: &str) -> Self {
        self.sourcetype = MetaValue::parse(value);
        self
    }

    #[must_use]
    pub fn index(mut self, value: &str) -> Self {
        self.index = MetaValue::parse(value);
        self
    }

    /// Host used when the default `$host$` reference finds no `host` field.
    #[must_use]
    pub fn fallback_host(mut self, host: impl Into<String>) -> Self {
        self.fallback_host = Some(host.into());
        self
    }

    /// Build an event, stamping records without `_time` with the current time.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidInput`] if the remaining fields cannot be represented as JSON.
    pub fn build(&self, record: &Record) -> SinkResult<HecEvent> {
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        self.build_at(record, now)
    }

    /// [`build`](Self::build) with an explicit current time in epoch seconds.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidInput`] if the remaining fields cannot be represented as JSON.
    pub fn build_at(&self, record: &Record, now: f64) -> SinkResult<HecEvent> {
        let mut fields = record.clone();
        let time = match fields.remove("_time") {
            Some(t) => time_value(&t),
            None => Value::from(now),
        };

        let mut host = self.host.take(&mut fields);
        if host.is_none() && self.host == MetaValue::Field("host".into()) {
            host.clone_from(&self.fallback_host);
        }
        let source = self.source.take(&mut fields);
        let sourcetype = self.sourcetype.take(&mut fields);
        let index = self.index.take(&mut fields);

        let event = match fields.get("_raw") {
            Some(raw) => Value::String(raw.to_text("\n").into_owned()),
            None => fields_to_value(&fields)?,
        };
        Ok(HecEvent {
            time,
            host,
            source,
            sourcetype,
            index,
            event,
        })
    }
}

fn time_value(t: &FieldValue) -> Value {
    match t {
        FieldValue::Number(n) => Value::Number(n.clone()),
        FieldValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| Value::String(s.clone()), Value::Number),
        other => Value::String(other.to_text(",").into_owned()),
    }
}

fn fields_to_value(fields: &Record) -> SinkResult<Value> {
    let mut map = Map::with_capacity(fields.len());
    for (key, value) in fields.iter() {
        let value = serde_json::to_value(value).map_err(|e| {
            SinkError::new(ErrorKind::InvalidInput, format!("field {key} is not valid JSON"))
                .with_detail(e.to_string())
        })?;
        map.insert(key.to_string(), value);
    }
    Ok(Value::Object(map))
}

/// Batches events and hands them to a transport.
pub struct HecBatcher<T: HecTransport> {
    transport: T,
    batch_size: usize,
    pending: Vec<String>,
    events_sent: u64,
    batches_sent: u64,
}

impl<T: HecTransport> HecBatcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            batch_size: DEFAULT_HEC_BATCH_SIZE,
            pending: Vec::new(),
            events_sent: 0,
            batches_sent: 0,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Queue one event, sending the batch once it is full.
    ///
    /// # Errors
    /// Returns the transport error of a triggered flush.
    pub fn push(&mut self, event: &HecEvent) -> SinkResult<()> {
        let line = serde_json::to_string(event).map_err(|e| {
            SinkError::new(ErrorKind::InvalidInput, "serialize HEC event").with_detail(e.to_string())
        })?;
        self.pending.push(line);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Send whatever is queued. Returns the number of events sent.
    ///
    /// # Errors
    /// Returns the transport error; the queued events are kept.
    pub fn flush(&mut self) -> SinkResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let batch = self.pending.join("\n");
        self.transport.send(&batch)?;
        let n = self.pending.len();
        self.pending.clear();
        self.events_sent += n as u64;
        self.batches_sent += 1;
        debug!(events = n, bytes = batch.len(), "sent HEC batch");
        Ok(n)
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn events_sent(&self) -> u64 {
        self.events_sent
    }

    #[must_use]
    pub fn batches_sent(&self) -> u64 {
        self.batches_sent
    }

    /// Flush and return the transport.
    ///
    /// # Errors
    /// Returns the transport error of the final flush.
    pub fn finish(mut self) -> SinkResult<T> {
        self.flush()?;
        Ok(self.transport)
    }
}

/// Build and send every record, returning the number of events delivered.
///
/// # Errors
/// Stops at the first build or transport error.
pub fn send_records<I, T>(
    records: I,
    builder: &HecEventBuilder,
    batcher: &mut HecBatcher<T>,
) -> SinkResult<u64>
where
    I: IntoIterator<Item = Record>,
    T: HecTransport,
{
    let before = batcher.events_sent();
    for record in records {
        batcher.push(&builder.build(&record)?)?;
    }
    batcher.flush()?;
    Ok(batcher.events_sent() - before)
}
