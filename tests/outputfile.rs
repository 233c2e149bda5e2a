use chrono::{TimeZone, Utc};
use export_everything::outputfile::{
    OutputPath, apply_compression_suffix, default_filename, parse_outputfile, parse_outputfile_at,
    replace_keywords,
};
use export_everything::{OutputFormat, TargetConfig};

const DEFAULT: &str = "export_admin.json";

fn resolve(outputfile: Option<&str>, default_folder: Option<&str>) -> (String, String) {
    let mut target = TargetConfig::new("t");
    target.default_folder = default_folder.map(String::from);
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 7, 5, 9).unwrap();
    let p = parse_outputfile_at(outputfile, DEFAULT, &target, &now);
    (p.folder, p.filename)
}

fn pair(folder: &str, filename: &str) -> (String, String) {
    (folder.to_string(), filename.to_string())
}

#[test]
fn no_path_uses_default_folder_and_filename() {
    assert_eq!(resolve(None, None), pair("", DEFAULT));
    assert_eq!(resolve(Some(""), Some("/exports")), pair("/exports", DEFAULT));
    assert_eq!(resolve(Some("  "), Some("exports/")), pair("exports", DEFAULT));
}

#[test]
fn bare_filename_goes_under_default_folder() {
    assert_eq!(resolve(Some("out.csv"), Some("/exports")), pair("/exports", "out.csv"));
    assert_eq!(
        resolve(Some("out.csv"), Some("exports/daily")),
        pair("exports/daily", "out.csv")
    );
    assert_eq!(resolve(Some("out.csv"), None), pair("", "out.csv"));
}

#[test]
fn leading_slash_is_absolute() {
    assert_eq!(resolve(Some("/data/out.csv"), Some("/exports")), pair("/data", "out.csv"));
    assert_eq!(resolve(Some("/out.csv"), Some("/exports")), pair("/", "out.csv"));
}

#[test]
fn relative_folder_is_appended_to_default_folder() {
    assert_eq!(
        resolve(Some("sub/out.csv"), Some("/exports")),
        pair("/exports/sub", "out.csv")
    );
    assert_eq!(resolve(Some("a//b/out.csv"), None), pair("a/b", "out.csv"));
}

#[test]
fn trailing_slash_means_folder_only() {
    assert_eq!(resolve(Some("sub/"), Some("/exports")), pair("/exports/sub", DEFAULT));
    assert_eq!(resolve(Some("/"), Some("/exports")), pair("/", DEFAULT));
}

#[test]
fn backslashes_are_path_separators() {
    assert_eq!(
        resolve(Some(r"sub\deeper\out.csv"), Some(r"\exports")),
        pair("/exports/sub/deeper", "out.csv")
    );
}

#[test]
fn keywords_are_replaced_in_folder_and_filename() {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 7, 5, 9).unwrap();
    let (folder, filename) = resolve(Some("__yesterday__/export___nowft__.csv"), Some("/x/__today__"));
    assert_eq!(folder, "/x/2024-03-01/2024-02-29");
    assert_eq!(filename, "export_2024-03-01_070509.csv");

    let (_, filename) = resolve(Some("e___now_____nowms__.log"), None);
    assert_eq!(
        filename,
        format!("e_{}_{}.log", now.timestamp(), now.timestamp_millis())
    );
}

#[test]
fn local_clock_keywords_leave_no_placeholders() {
    let out = replace_keywords("__now__-__nowms__-__nowft__-__today__-__yesterday__");
    assert!(!out.contains("__"), "{out}");

    let target = TargetConfig::new("t").with_default_folder("/e/__today__");
    let p = parse_outputfile(None, "f___now__.json", &target);
    assert!(!p.remote_path().contains("__"));
}

#[test]
fn default_filename_uses_format_extension() {
    assert_eq!(default_filename("admin", OutputFormat::Csv), "export_admin___now__.csv");
    assert_eq!(default_filename("'bob'", OutputFormat::Raw), "export_bob___now__.log");
    assert_eq!(default_filename("u", OutputFormat::Pipe), "export_u___now__.log");
    assert_eq!(default_filename("u", OutputFormat::Json), "export_u___now__.json");
}

#[test]
fn gz_suffix_and_compression_agree() {
    assert_eq!(apply_compression_suffix("out.json", true), ("out.json.gz".into(), true));
    assert_eq!(apply_compression_suffix("out.json.GZ", false), ("out.json.GZ".into(), true));
    assert_eq!(apply_compression_suffix("out.json", false), ("out.json".into(), false));
}

#[test]
fn remote_path_display() {
    let p = OutputPath {
        folder: "/exports/sub".into(),
        filename: "out.csv".into(),
    };
    assert_eq!(p.to_string(), "/exports/sub/out.csv");
    assert_eq!(p.folder_segments().collect::<Vec<_>>(), vec!["exports", "sub"]);
}
