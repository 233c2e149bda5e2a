use anyhow::Result;
use export_everything::io::jsonl::{read_records, read_records_path, read_records_vec};
use export_everything::{FieldValue, record};
use std::io::Write;
use tempfile::TempDir;

const INPUT: &str = r#"{"_raw": "hello", "host": "web01"}

{"a": 1, "tags": ["x", "y"], "missing": null, "ok": true}
"#;

#[test]
fn reads_records_and_skips_blank_lines() -> Result<()> {
    let records = read_records(INPUT.as_bytes(), "inline").collect::<Result<Vec<_>>>()?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], record! { "_raw" => "hello", "host" => "web01" });
    assert_eq!(records[1].keys().collect::<Vec<_>>(), vec!["a", "tags", "missing", "ok"]);
    assert_eq!(records[1].get("tags"), Some(&FieldValue::from(vec!["x", "y"])));
    assert!(records[1].get("tags").is_some_and(FieldValue::is_list));
    assert!(!records[1].get("a").is_some_and(FieldValue::is_list));
    assert_eq!(records[1].get("missing"), Some(&FieldValue::Null));
    assert_eq!(records[1].get("ok"), Some(&FieldValue::Bool(true)));
    Ok(())
}

#[test]
fn parse_errors_name_the_line() {
    let input = "{\"a\": 1}\nnot json\n";
    let results: Vec<_> = read_records(input.as_bytes(), "inline").collect();
    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    assert!(format!("{err:#}").contains("line 2 in inline"), "{err:#}");
}

#[test]
fn reads_plain_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("in.jsonl");
    std::fs::write(&path, INPUT)?;
    assert_eq!(read_records_vec(&path)?.len(), 2);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn reads_gzip_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("in.jsonl.gz");
    let mut enc = flate2::write::GzEncoder::new(
        std::fs::File::create(&path)?,
        flate2::Compression::default(),
    );
    enc.write_all(INPUT.as_bytes())?;
    enc.finish()?;

    let records = read_records_path(&path)?.collect::<Result<Vec<_>>>()?;
    assert_eq!(records[0].raw(), Some("hello"));
    Ok(())
}

#[test]
fn missing_file_is_an_error() {
    assert!(read_records_path("/definitely/not/here.jsonl").is_err());
}
