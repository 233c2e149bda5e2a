#[cfg(feature = "compression-gzip")]
mod gzip_tests {
    use anyhow::Result;
    use export_everything::io::compression::{Compression, auto_detect_reader, read_to_string};
    use export_everything::{
        ChunkState, ExportOptions, ExportSession, NeverFinalizing, OutputFormat, Record,
        StagingFile, record, write_events_to_file,
    };
    use flate2::read::MultiGzDecoder;
    use std::io::Read;
    use std::path::Path;
    use tempfile::TempDir;

    fn chunks() -> Vec<(Vec<Record>, ChunkState)> {
        vec![
            (
                vec![record! { "a" => "1", "b" => "x,y" }, record! { "a" => "2" }],
                ChunkState::new(false, Some(false)),
            ),
            (
                vec![record! { "a" => "3", "b" => r#"q"uote"# }],
                ChunkState::new(true, Some(true)),
            ),
        ]
    }

    fn export(path: &Path, compress: bool, format: OutputFormat) -> Result<()> {
        let options = ExportOptions::default()
            .with_format(format)
            .compressed(compress);
        let mut session = ExportSession::new();
        for (records, chunk) in chunks() {
            write_events_to_file(records, &options, path, chunk, &mut session, NeverFinalizing)
                .drain()?;
        }
        Ok(())
    }

    #[test]
    fn compressed_output_decodes_to_plain_output() -> Result<()> {
        let dir = TempDir::new()?;
        for format in [OutputFormat::Csv, OutputFormat::Json, OutputFormat::Kv] {
            let plain = dir.path().join(format!("plain.{format}"));
            let gz = dir.path().join(format!("packed.{format}.gz"));
            export(&plain, false, format)?;
            export(&gz, true, format)?;

            let bytes = std::fs::read(&gz)?;
            assert_eq!(&bytes[..2], &[0x1f, 0x8b], "{format} is not gzip");

            let mut decoded = String::new();
            MultiGzDecoder::new(bytes.as_slice()).read_to_string(&mut decoded)?;
            assert_eq!(decoded, std::fs::read_to_string(&plain)?, "{format}");
        }
        Ok(())
    }

    #[test]
    fn every_flush_appends_a_gzip_member() -> Result<()> {
        let dir = TempDir::new()?;
        let staging = StagingFile::new(dir.path().join("s.log.gz"), Compression::Gzip);
        staging.append(&[b"one\n".to_vec()])?;
        let after_first = staging.len_on_disk();
        staging.append(&[b"two\n".to_vec(), b"three\n".to_vec()])?;
        assert!(staging.len_on_disk() > after_first);
        assert_eq!(read_to_string(staging.path())?, "one\ntwo\nthree\n");
        Ok(())
    }

    #[test]
    fn empty_compressed_export_is_valid_gzip() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("empty.log.gz");
        let options = ExportOptions::default()
            .with_format(OutputFormat::Raw)
            .compressed(true);
        let mut session = ExportSession::new();
        write_events_to_file(
            Vec::new(),
            &options,
            &path,
            ChunkState::single(),
            &mut session,
            NeverFinalizing,
        )
        .drain()?;
        assert_eq!(read_to_string(&path)?, "");
        Ok(())
    }

    #[test]
    fn gzip_is_detected_by_magic_bytes() -> Result<()> {
        let dir = TempDir::new()?;
        let staging = StagingFile::new(dir.path().join("no_extension"), Compression::Gzip);
        staging.append(&[b"hidden\n".to_vec()])?;

        let file = std::fs::File::open(staging.path())?;
        let mut out = String::new();
        auto_detect_reader(file, staging.path())?.read_to_string(&mut out)?;
        assert_eq!(out, "hidden\n");
        Ok(())
    }

    #[test]
    fn compression_from_path() {
        assert_eq!(Compression::from_path("a.csv.gz"), Compression::Gzip);
        assert_eq!(Compression::from_path("A.GZIP"), Compression::Gzip);
        assert_eq!(Compression::from_path("a.csv"), Compression::None);
        assert_eq!(Compression::Gzip.extension(), Some(".gz"));
    }
}

use anyhow::Result;
use export_everything::StagingFile;
use export_everything::io::compression::Compression;
use tempfile::TempDir;

#[test]
fn plain_staging_file_appends_and_removes() -> Result<()> {
    let dir = TempDir::new()?;
    let staging = StagingFile::new(dir.path().join("nested/dir/s.log"), Compression::None);
    assert_eq!(staging.len_on_disk(), 0);

    let stats = staging.append(&[b"a\n".to_vec(), b"bc\n".to_vec()])?;
    assert_eq!(stats.fragments, 2);
    assert_eq!(stats.bytes, 5);
    staging.append(&[])?;
    staging.append(&[b"d\n".to_vec()])?;
    assert_eq!(std::fs::read_to_string(staging.path())?, "a\nbc\nd\n");

    staging.remove()?;
    assert!(!staging.path().exists());
    staging.remove()?;
    Ok(())
}
