use anyhow::Result;
use export_everything::io::remote::{
    ErrorKind, FakeObjectIO, LocalDirSink, ObjectIO, ObjectStoreSink, RemoteSink,
};
use export_everything::{
    ChunkState, Compression, ExportOptions, ExportSession, NeverFinalizing, OutputPath,
    StagingFile, TargetConfig, deliver, record, write_events_to_file,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn staged(dir: &TempDir, contents: &str) -> Result<PathBuf> {
    let path = dir.path().join("staging.log");
    std::fs::write(&path, contents)?;
    Ok(path)
}

fn remote(folder: &str, filename: &str) -> OutputPath {
    OutputPath {
        folder: folder.into(),
        filename: filename.into(),
    }
}

#[test]
fn local_sink_creates_folders_and_writes_file() -> Result<()> {
    let staging = TempDir::new()?;
    let root = TempDir::new()?;
    let local = staged(&staging, "hello\nworld\n")?;
    let sink = LocalDirSink::new(root.path());
    assert_eq!(sink.root(), root.path());

    let bytes = sink.upload(&local, &remote("/exports/2024-03-01", "out.log"))?;
    assert_eq!(bytes, 12);

    let target = root.path().join("exports/2024-03-01/out.log");
    assert_eq!(std::fs::read_to_string(&target)?, "hello\nworld\n");
    let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())?
        .map(|e| e.map(|e| e.file_name()))
        .collect::<Result<_, _>>()?;
    assert_eq!(leftovers, vec![std::ffi::OsString::from("out.log")]);
    Ok(())
}

#[test]
fn local_sink_overwrites_existing_file() -> Result<()> {
    let staging = TempDir::new()?;
    let root = TempDir::new()?;
    let sink = LocalDirSink::new(root.path());
    let dest = remote("", "out.log");

    sink.upload(&staged(&staging, "old")?, &dest)?;
    sink.upload(&staged(&staging, "new")?, &dest)?;
    assert_eq!(std::fs::read_to_string(root.path().join("out.log"))?, "new");
    assert_eq!(sink.resolve(&dest)?, root.path().join("out.log"));
    Ok(())
}

#[test]
fn local_sink_rejects_escaping_paths() -> Result<()> {
    let staging = TempDir::new()?;
    let root = TempDir::new()?;
    let local = staged(&staging, "x")?;
    let sink = LocalDirSink::new(root.path());

    let err = sink.upload(&local, &remote("/exports/../..", "out.log")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    let err = sink.upload(&local, &remote("/exports", "..")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);
    Ok(())
}

#[test]
fn local_sink_reports_missing_staging_file() -> Result<()> {
    let root = TempDir::new()?;
    let sink = LocalDirSink::new(root.path());
    let err = sink
        .upload(&root.path().join("missing.log"), &remote("", "out.log"))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(err.detail.is_some());
    Ok(())
}

#[test]
fn object_sink_uses_folder_as_key_prefix() -> Result<()> {
    let staging = TempDir::new()?;
    let store = FakeObjectIO::new();
    store.create_bucket("exports")?;
    let target = TargetConfig::new("s3").with_setting("bucket", "exports");
    let sink = ObjectStoreSink::from_target(store.clone(), &target)?;
    assert_eq!(sink.bucket(), "exports");
    assert!(sink.object_io().list_objects("exports", None)?.is_empty());

    let local = staged(&staging, "a,b\n1,2\n")?;
    let bytes = sink.upload(&local, &remote("/daily/2024", "out.csv"))?;
    assert_eq!(bytes, 8);
    assert!(store.object_exists("exports", "daily/2024/out.csv")?);
    assert_eq!(store.get_object("exports", "daily/2024/out.csv")?, b"a,b\n1,2\n");

    let listed = store.list_objects("exports", Some("daily/"))?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].size, 8);
    Ok(())
}

#[test]
fn object_sink_errors() -> Result<()> {
    let staging = TempDir::new()?;
    let local = staged(&staging, "x")?;

    let no_bucket = ObjectStoreSink::from_target(FakeObjectIO::new(), &TargetConfig::new("s3"));
    assert_eq!(no_bucket.err().map(|e| e.kind), Some(ErrorKind::InvalidInput));

    let sink = ObjectStoreSink::new(FakeObjectIO::new(), "never-created");
    let err = sink.upload(&local, &remote("", "out.log")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn deliver_uploads_then_removes_staging() -> Result<()> {
    let staging_dir = TempDir::new()?;
    let root = TempDir::new()?;
    let path = staging_dir.path().join("out.csv.gz");
    let options = ExportOptions::default()
        .with_format(export_everything::OutputFormat::Csv)
        .compressed(true);
    let mut session = ExportSession::new();
    write_events_to_file(
        vec![record! { "a" => "1" }],
        &options,
        &path,
        ChunkState::single(),
        &mut session,
        NeverFinalizing,
    )
    .drain()?;

    let staging = StagingFile::new(&path, Compression::Gzip);
    assert!(staging.compression().is_compressed());
    let dest = remote("/out", "file.csv.gz");
    let sink = LocalDirSink::new(root.path());
    let bytes = deliver(&staging, &sink, &dest)?;

    assert!(!path.exists());
    let uploaded = root.path().join("out/file.csv.gz");
    assert_eq!(std::fs::metadata(&uploaded)?.len(), bytes);
    assert_eq!(
        export_everything::io::compression::read_to_string(&uploaded)?,
        "a\n1\n"
    );
    Ok(())
}

#[test]
fn failed_delivery_keeps_staging() -> Result<()> {
    let staging_dir = TempDir::new()?;
    let path = staged(&staging_dir, "x")?;
    let staging = StagingFile::new(&path, Compression::None);
    let sink = ObjectStoreSink::new(FakeObjectIO::new(), "missing");
    assert!(deliver(&staging, &sink, &remote("", "f.log")).is_err());
    assert!(path.exists());
    Ok(())
}
