//! Output path resolution.
//!
//! Users name the remote file with a single `outputfile` value. [`parse_outputfile`]
//! splits it into a folder and a filename, applies the target's default folder and
//! substitutes time keywords.
//!
//! | input                | folder                      | filename           |
//! |----------------------|-----------------------------|--------------------|
//! | *(none)*             | default folder              | default filename   |
//! | `out.csv`            | default folder              | `out.csv`          |
//! | `/data/out.csv`      | `/data`                     | `out.csv`          |
//! | `sub/out.csv`        | default folder + `/sub`     | `out.csv`          |
//! | `sub/`               | default folder + `/sub`     | default filename   |
//!
//! Backslashes are treated as forward slashes. Empty path segments are dropped. The
//! folder is absolute when the input starts with `/` or when the default folder that was
//! prepended does.

use chrono::{DateTime, Local, TimeDelta, TimeZone};
use regex::{Captures, Regex};
use std::fmt;
use std::sync::LazyLock;

use crate::config::TargetConfig;
use crate::format::OutputFormat;

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__(nowms|nowft|now|today|yesterday)__").expect("keyword pattern")
});

/// A resolved remote location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPath {
    /// Folder, `/`-separated. Empty for the sink's working directory.
    pub folder: String,
    pub filename: String,
}

impl OutputPath {
    /// Folder and filename joined with `/`.
    #[must_use]
    pub fn remote_path(&self) -> String {
        match self.folder.trim_end_matches('/') {
            "" if self.folder.starts_with('/') => format!("/{}", self.filename),
            "" => self.filename.clone(),
            folder => format!("{folder}/{}", self.filename),
        }
    }

    /// Folder segments, outermost first.
    pub fn folder_segments(&self) -> impl Iterator<Item = &str> {
        self.folder.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for OutputPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.remote_path())
    }
}

/// Substitute time keywords using the local clock.
///
/// | keyword           | value                                 |
/// |-------------------|---------------------------------------|
/// | `__now__`         | epoch seconds                         |
/// | `__nowms__`       | epoch milliseconds                    |
/// | `__nowft__`       | `YYYY-mm-dd_HHMMSS`                   |
/// | `__today__`       | `YYYY-mm-dd`                          |
/// | `__yesterday__`   | `YYYY-mm-dd` of the previous day      |
#[must_use]
pub fn replace_keywords(text: &str) -> String {
    replace_keywords_at(text, &Local::now())
}

/// [`replace_keywords`] against a fixed point in time.
#[must_use]
pub fn replace_keywords_at<Tz>(text: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    KEYWORD
        .replace_all(text, |caps: &Captures<'_>| match &caps[1] {
            "now" => now.timestamp().to_string(),
            "nowms" => now.timestamp_millis().to_string(),
            "nowft" => now.format("%Y-%m-%d_%H%M%S").to_string(),
            "today" => now.format("%Y-%m-%d").to_string(),
            _ => (now.clone() - TimeDelta::days(1))
                .format("%Y-%m-%d")
                .to_string(),
        })
        .into_owned()
}

/// `export_<user>___now__<ext>`, the filename used when the user gives none.
#[must_use]
pub fn default_filename(user: &str, format: OutputFormat) -> String {
    format!(
        "export_{}___now__{}",
        user.trim_matches('\''),
        format.file_extension()
    )
}

/// Reconcile a filename with the compression setting.
///
/// A filename ending in `.gz` turns compression on; compression on appends `.gz` when it
/// is missing. Returns the final filename and compression flag.
#[must_use]
pub fn apply_compression_suffix(filename: &str, compress: bool) -> (String, bool) {
    let has_suffix = filename.len() > 3 && filename.to_ascii_lowercase().ends_with(".gz");
    match (compress, has_suffix) {
        (false, true) => (filename.to_string(), true),
        (true, false) => (format!("{filename}.gz"), true),
        _ => (filename.to_string(), compress),
    }
}

/// Split `outputfile` into folder and filename for `target`.
#[must_use]
pub fn parse_outputfile(
    outputfile: Option<&str>,
    default_filename: &str,
    target: &TargetConfig,
) -> OutputPath {
    parse_outputfile_at(outputfile, default_filename, target, &Local::now())
}

/// [`parse_outputfile`] with keywords resolved against `now`.
#[must_use]
pub fn parse_outputfile_at<Tz>(
    outputfile: Option<&str>,
    default_filename: &str,
    target: &TargetConfig,
    now: &DateTime<Tz>,
) -> OutputPath
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let normalized = outputfile
        .map(|p| p.trim().replace('\\', "/"))
        .filter(|p| !p.is_empty());

    let (mut absolute, mut segments, filename) = match normalized.as_deref() {
        None => (false, Vec::new(), default_filename.to_string()),
        Some(path) => {
            let (folder, name) = path.rsplit_once('/').unwrap_or(("", path));
            let name = if name.is_empty() { default_filename } else { name };
            let segments: Vec<String> = folder
                .split('/')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            (path.starts_with('/'), segments, name.to_string())
        }
    };

    if !absolute && let Some(default_folder) = target.default_folder() {
        let default_folder = default_folder.replace('\\', "/");
        absolute = default_folder.starts_with('/');
        let mut combined: Vec<String> = default_folder
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        combined.append(&mut segments);
        segments = combined;
    }

    let joined = segments.join("/");
    let folder = if absolute { format!("/{joined}") } else { joined };
    OutputPath {
        folder: replace_keywords_at(&folder, now),
        filename: replace_keywords_at(&filename, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn keywords_in_utc() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 7, 5, 9).unwrap();
        assert_eq!(
            replace_keywords_at("a___now__b", &now),
            format!("a_{}b", now.timestamp())
        );
        assert_eq!(
            replace_keywords_at("__nowms__", &now),
            now.timestamp_millis().to_string()
        );
        assert_eq!(replace_keywords_at("__nowft__", &now), "2024-03-01_070509");
        assert_eq!(replace_keywords_at("d/__today__", &now), "d/2024-03-01");
        assert_eq!(replace_keywords_at("__yesterday__", &now), "2024-02-29");
        assert_eq!(replace_keywords_at("__later__", &now), "__later__");
    }

    #[test]
    fn compression_suffix() {
        assert_eq!(apply_compression_suffix("a.csv", true), ("a.csv.gz".into(), true));
        assert_eq!(apply_compression_suffix("a.csv.gz", false), ("a.csv.gz".into(), true));
        assert_eq!(apply_compression_suffix("a.csv", false), ("a.csv".into(), false));
        assert_eq!(apply_compression_suffix(".gz", false), (".gz".into(), false));
    }

    #[test]
    fn remote_path_joins() {
        let p = |folder: &str| OutputPath {
            folder: folder.into(),
            filename: "f.log".into(),
        };
        assert_eq!(p("").remote_path(), "f.log");
        assert_eq!(p("/").remote_path(), "/f.log");
        assert_eq!(p("/a/b").remote_path(), "/a/b/f.log");
        assert_eq!(p("a").remote_path(), "a/f.log");
    }
}
