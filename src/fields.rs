//! Field selection.
//!
//! A [`FieldSelector`] decides which keys of a record are exported. Callers may pass an
//! allow-list of literal names and shell-style glob patterns (`*`, `?`, `[abc]`); without
//! one every field is kept. Splunk's internal bookkeeping fields and the `date_*`
//! decomposition fields are always stripped unless the allow-list asks for them or the
//! matching flag is set.
//!
//! Match decisions are made once per field name and cached for the life of the
//! selector, so a stream sees a stable key set no matter how many records flow through.

use anyhow::{Context, Result, bail};
use glob::Pattern;
use std::collections::HashMap;

use crate::record::Record;

/// Splunk metadata fields stripped by default.
pub const INTERNAL_FIELDS: &[&str] = &[
    "_bkt",
    "_cd",
    "_si",
    "_kv",
    "_serial",
    "_indextime",
    "_sourcetype",
    "splunk_server",
    "splunk_server_group",
    "punct",
    "linecount",
    "_subsecond",
    "timestartpos",
    "timeendpos",
    "_eventtype_color",
];

/// Timestamp decomposition fields stripped by default.
pub const DATE_FIELDS: &[&str] = &[
    "date_second",
    "date_hour",
    "date_minute",
    "date_year",
    "date_month",
    "date_mday",
    "date_wday",
    "date_zone",
];

#[derive(Debug, Clone)]
enum FieldPattern {
    Literal(String),
    Glob(Pattern),
}

impl FieldPattern {
    fn parse(entry: &str) -> Result<Self> {
        if entry.contains(['*', '?', '[']) {
            let pattern = Pattern::new(entry)
                .with_context(|| format!("invalid field pattern: {entry}"))?;
            Ok(Self::Glob(pattern))
        } else {
            Ok(Self::Literal(entry.to_string()))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Literal(l) => l == name,
            Self::Glob(p) => p.matches(name),
        }
    }
}

/// An explicit allow-list of field names and glob patterns.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    entries: Vec<FieldPattern>,
}

impl FieldSpec {
    /// Build a spec from individual entries. Blank entries are ignored.
    ///
    /// # Errors
    /// Returns an error if a glob entry is malformed or no usable entry remains.
    pub fn new<S: AsRef<str>>(entries: impl IntoIterator<Item = S>) -> Result<Self> {
        let entries = entries
            .into_iter()
            .map(|e| e.as_ref().trim().to_string())
            .filter(|e| !e.is_empty())
            .map(|e| FieldPattern::parse(&e))
            .collect::<Result<Vec<_>>>()?;
        if entries.is_empty() {
            bail!("field list is empty");
        }
        Ok(Self { entries })
    }

    /// Parse a comma-separated option value such as `host, "my field", date_*`.
    ///
    /// Entries are trimmed and may be double-quoted to carry commas or spaces.
    ///
    /// # Errors
    /// Returns an error if the list cannot be tokenized or yields no entries.
    pub fn parse(list: &str) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(list.as_bytes());
        let mut entries = Vec::new();
        for row in rdr.records() {
            let row = row.with_context(|| format!("parse field list: {list}"))?;
            // A quote preceded by a space is not recognized by the tokenizer.
            entries.extend(row.iter().map(|e| e.trim().trim_matches('"').to_string()));
        }
        Self::new(entries)
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.matches(name))
    }
}

/// Decides, per field name, whether a field is exported.
#[derive(Debug, Clone, Default)]
pub struct FieldSelector {
    spec: Option<FieldSpec>,
    internal_fields: bool,
    date_fields: bool,
    decisions: HashMap<String, bool>,
}

impl FieldSelector {
    #[must_use]
    pub fn new(spec: Option<FieldSpec>) -> Self {
        Self {
            spec,
            ..Self::default()
        }
    }

    /// Keep Splunk internal fields even without an explicit request.
    #[must_use]
    pub fn internal_fields(mut self, keep: bool) -> Self {
        self.internal_fields = keep;
        self.decisions.clear();
        self
    }

    /// Keep `date_*` fields even without an explicit request.
    #[must_use]
    pub fn date_fields(mut self, keep: bool) -> Self {
        self.date_fields = keep;
        self.decisions.clear();
        self
    }

    #[must_use]
    pub fn has_spec(&self) -> bool {
        self.spec.is_some()
    }

    /// Whether `name` is exported. The answer is cached.
    pub fn allows(&mut self, name: &str) -> bool {
        if let Some(&decision) = self.decisions.get(name) {
            return decision;
        }
        let decision = self.decide(name);
        self.decisions.insert(name.to_string(), decision);
        decision
    }

    fn decide(&self, name: &str) -> bool {
        // An explicit request (by name or pattern) overrides the default strip lists.
        if let Some(spec) = &self.spec {
            return spec.matches(name);
        }
        if !self.internal_fields && INTERNAL_FIELDS.contains(&name) {
            return false;
        }
        if !self.date_fields && DATE_FIELDS.contains(&name) {
            return false;
        }
        true
    }

    /// The record's exported keys, in record order.
    pub fn select<'r>(&mut self, record: &'r Record) -> Vec<&'r str> {
        record.keys().filter(|k| self.allows(k)).collect()
    }
}
