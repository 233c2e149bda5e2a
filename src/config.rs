//! Export target configuration.
//!
//! An [`AppConfig`] is a JSON document holding the log level and a list of export
//! targets:
//!
//! ```json
//! {
//!   "log_level": "debug",
//!   "targets": [
//!     { "alias": "archive", "default_folder": "/exports/__today__", "compress": "yes",
//!       "is_default": true, "root": "/srv/archive" }
//!   ]
//! }
//! ```
//!
//! Keys other than `alias`, `default_folder`, `compress` and `is_default` are kept as
//! opaque backend settings (credentials, hosts, sink roots) and read with
//! [`TargetConfig::setting`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no export target with alias `{0}`")]
    UnknownAlias(String),
    #[error("no target alias given and no target is marked as default")]
    NoDefaultTarget,
}

/// Interpret a configuration string as a boolean: `yes`, `true`, `t` and `1` are true
/// (case-insensitive), anything else is false.
#[must_use]
pub fn str2bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "t" | "1"
    )
}

fn bool_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(str2bool(s)),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

/// Deserialize a boolean that may be written as a JSON bool, a number or a string.
pub fn deserialize_bool_from_anything<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_optional_bool_from_anything(deserializer)?.unwrap_or(false))
}

pub fn deserialize_optional_bool_from_anything<'de, D>(
    deserializer: D,
) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Value> = Option::deserialize(deserializer)?;
    match opt {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let parsed = bool_from_value(&value);
            if parsed.is_none() {
                warn!(%value, "ignoring non-boolean value for a boolean setting");
            }
            Ok(parsed)
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Settings for one export destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub alias: String,
    /// Folder prepended to relative output paths. May contain time keywords.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_folder: Option<String>,
    /// Compression default for exports to this target.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_bool_from_anything",
        skip_serializing_if = "Option::is_none"
    )]
    pub compress: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_bool_from_anything")]
    pub is_default: bool,
    /// Backend settings this crate does not interpret.
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
}

impl TargetConfig {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_default_folder(mut self, folder: impl Into<String>) -> Self {
        self.default_folder = Some(folder.into());
        self
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// A backend setting as a string. Numbers and booleans are rendered as text.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<String> {
        match self.settings.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    #[must_use]
    pub fn setting_bool(&self, key: &str) -> Option<bool> {
        self.settings.get(key).and_then(bool_from_value)
    }

    /// `default_folder`, ignoring an empty value.
    #[must_use]
    pub fn default_folder(&self) -> Option<&str> {
        self.default_folder
            .as_deref()
            .filter(|f| !f.trim().is_empty())
    }
}

/// The application configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            targets: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load a configuration file.
    ///
    /// # Errors
    /// [`ConfigError::Io`] when the file cannot be read, [`ConfigError::Parse`] when it
    /// is not a valid configuration document.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// # Errors
    /// [`ConfigError::Parse`] when `text` is not a valid configuration document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The target named `alias`, or the default target when no alias is given.
    ///
    /// # Errors
    /// [`ConfigError::UnknownAlias`] or [`ConfigError::NoDefaultTarget`].
    pub fn target(&self, alias: Option<&str>) -> Result<&TargetConfig, ConfigError> {
        match alias.map(str::trim).filter(|a| !a.is_empty()) {
            Some(alias) => self
                .targets
                .iter()
                .find(|t| t.alias == alias)
                .ok_or_else(|| ConfigError::UnknownAlias(alias.to_string())),
            None => self
                .targets
                .iter()
                .find(|t| t.is_default)
                .ok_or(ConfigError::NoDefaultTarget),
        }
    }
}

/// Resolve the target configuration for an export: by alias, else the default target.
///
/// # Errors
/// See [`AppConfig::target`].
pub fn get_config_from_alias(
    config: &AppConfig,
    alias: Option<&str>,
) -> Result<TargetConfig, ConfigError> {
    config.target(alias).cloned()
}
