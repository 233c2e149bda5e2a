//! `export-everything` - export JSON Lines search results to a configured target.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use tracing::{error, info};

use export_everything::config::str2bool;
use export_everything::io::jsonl::{read_records, read_records_path};
use export_everything::{
    AppConfig, ChunkState, Compression, ExportOptions, ExportSession, FieldSelector, FieldSpec,
    LocalDirSink,
    NeverFinalizing, OutputFormat, OutputPath, Record, StagingFile, TargetConfig,
    apply_compression_suffix, default_filename, deliver, get_config_from_alias,
    parse_outputfile, write_events_to_file,
};

/// Export search results to raw, KV, delimited or JSON files on a remote target.
#[derive(Debug, Parser)]
#[command(name = "export-everything", version, about, long_about = None)]
struct Cli {
    /// Increase verbosity level (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the JSON configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "EXPORT_EVERYTHING_CONFIG",
        value_hint = ValueHint::FilePath
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write records to a staging file and upload it to the target
    Export(ExportArgs),
    /// Print the remote path an export would be written to
    Resolve(TargetArgs),
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Target alias; the default target when omitted
    #[arg(short, long)]
    target: Option<String>,

    /// Remote folder and/or filename; may contain __now__-style keywords
    #[arg(short, long)]
    outputfile: Option<String>,

    /// Output format: raw, kv, csv, tsv, pipe or json. When omitted, `export` picks raw
    /// or json from the first record and `resolve` assumes json
    #[arg(short = 'f', long)]
    format: Option<OutputFormat>,

    /// Gzip the export (true/false, yes/no, 1/0); defaults to the target setting
    #[arg(long)]
    compress: Option<String>,

    /// User name for the default filename
    #[arg(long, env = "USER", default_value = "nobody")]
    user: String,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// JSON Lines input (optionally gzip); stdin when omitted or `-`
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Comma-separated field names or glob patterns to export
    #[arg(long)]
    fields: Option<String>,

    /// Keep fields with empty values
    #[arg(long)]
    blank_fields: bool,

    /// Keep Splunk internal fields
    #[arg(long)]
    internal_fields: bool,

    /// Keep date_* fields
    #[arg(long)]
    date_fields: bool,

    /// Deliver the input in chunks of this many records
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: Option<u64>,

    /// Directory for the staging file
    #[arg(long, value_hint = ValueHint::DirPath)]
    staging_dir: Option<PathBuf>,
}

/// Where an export goes and how it is compressed.
struct Destination {
    target: TargetConfig,
    remote: OutputPath,
    compress: bool,
}

fn resolve_destination(
    config: &AppConfig,
    args: &TargetArgs,
    format: OutputFormat,
) -> Result<Destination> {
    let target = get_config_from_alias(config, args.target.as_deref())?;
    let path = parse_outputfile(
        args.outputfile.as_deref(),
        &default_filename(&args.user, format),
        &target,
    );
    let requested = args
        .compress
        .as_deref()
        .map(str2bool)
        .or(target.compress)
        .unwrap_or(false);
    let (filename, compress) = apply_compression_suffix(&path.filename, requested);
    Ok(Destination {
        target,
        remote: OutputPath {
            folder: path.folder,
            filename,
        },
        compress,
    })
}

fn stage(
    source: impl Iterator<Item = Result<Record>>,
    options: &ExportOptions,
    staging: &Path,
    chunk_size: Option<usize>,
) -> Result<ExportSession> {
    let mut session = ExportSession::new();
    let Some(chunk_size) = chunk_size else {
        let mut failure = None;
        let records = source.map_while(|r| match r {
            Ok(record) => Some(record),
            Err(e) => {
                failure = Some(e);
                None
            }
        });
        write_events_to_file(
            records,
            options,
            staging,
            ChunkState::single(),
            &mut session,
            NeverFinalizing,
        )
        .drain()?;
        return match failure {
            Some(e) => Err(e),
            None => Ok(session),
        };
    };

    let mut source = source.peekable();
    let mut append_chunk = false;
    loop {
        let batch = source
            .by_ref()
            .take(chunk_size)
            .collect::<Result<Vec<_>>>()?;
        let last = source.peek().is_none();
        write_events_to_file(
            batch,
            options,
            staging,
            ChunkState::new(append_chunk, Some(last)),
            &mut session,
            NeverFinalizing,
        )
        .drain()?;
        if last {
            return Ok(session);
        }
        append_chunk = true;
    }
}

/// The format that names the default filename: the requested one, else what the export
/// will infer from its first record.
fn filename_format(
    requested: Option<OutputFormat>,
    first: Option<&Record>,
    mut selector: FieldSelector,
) -> OutputFormat {
    match (requested, first) {
        (Some(format), _) => format,
        (None, Some(record)) => OutputFormat::infer(selector.select(record).into_iter()),
        (None, None) => OutputFormat::Json,
    }
}

type RecordSource = Box<dyn Iterator<Item = Result<Record>>>;

fn open_input(input: Option<&Path>) -> Result<RecordSource> {
    Ok(match input.filter(|p| *p != Path::new("-")) {
        Some(path) => Box::new(read_records_path(path)?),
        None => Box::new(read_records(std::io::stdin(), "stdin")),
    })
}

fn export(config: &AppConfig, args: &ExportArgs) -> Result<()> {
    let fields = args.fields.as_deref().map(FieldSpec::parse).transpose()?;
    let mut source = open_input(args.input.as_deref())?.peekable();

    let first = match source.peek() {
        Some(Ok(record)) => Some(record),
        _ => None,
    };
    let selector = FieldSelector::new(fields.clone())
        .internal_fields(args.internal_fields)
        .date_fields(args.date_fields);
    let format = filename_format(args.target.format, first, selector);
    let dest = resolve_destination(config, &args.target, format)?;
    let root = dest
        .target
        .setting("root")
        .ok_or_else(|| anyhow!("target {} has no `root` folder configured", dest.target.alias))?;
    let sink = LocalDirSink::new(root);

    let options = ExportOptions {
        fields,
        format: args.target.format,
        compress: dest.compress,
        blank_fields: args.blank_fields,
        internal_fields: args.internal_fields,
        date_fields: args.date_fields,
        ..ExportOptions::default()
    };

    let staging_root = args.staging_dir.clone().unwrap_or_else(std::env::temp_dir);
    let staging_dir = tempfile::Builder::new()
        .prefix("export-everything-")
        .tempdir_in(&staging_root)
        .with_context(|| format!("create staging dir in {}", staging_root.display()))?;
    let staging = StagingFile::new(
        staging_dir.path().join(&dest.remote.filename),
        Compression::from_flag(dest.compress),
    );

    let chunk_size = args
        .chunk_size
        .map(usize::try_from)
        .transpose()
        .context("chunk size")?;
    let session = stage(source, &options, staging.path(), chunk_size)?;

    let bytes = deliver(&staging, &sink, &dest.remote)?;
    let totals = session.totals();
    info!(
        target_alias = %dest.target.alias,
        remote = %dest.remote,
        records = totals.records_written,
        skipped = totals.records_skipped,
        bytes,
        "export delivered"
    );
    println!("{}", dest.remote);
    Ok(())
}

fn init_tracing(verbose: u8, config_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .init();
}

fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    match &cli.command {
        Command::Export(args) => export(config, args),
        Command::Resolve(args) => {
            let format = args.format.unwrap_or(OutputFormat::Json);
            let dest = resolve_destination(config, args, format)?;
            println!("{}", dest.remote);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::from_path(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.verbose, "info");
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(cli.verbose, &config.log_level);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use export_everything::record;

    #[test]
    fn default_filename_follows_the_inferred_format() {
        let raw = record! { "_raw" => "line", "host" => "web01" };
        let fields = record! { "host" => "web01" };

        assert_eq!(
            filename_format(None, Some(&raw), FieldSelector::new(None)),
            OutputFormat::Raw
        );
        assert_eq!(
            filename_format(None, Some(&fields), FieldSelector::new(None)),
            OutputFormat::Json
        );
        assert_eq!(
            filename_format(None, None, FieldSelector::new(None)),
            OutputFormat::Json
        );
        assert_eq!(
            filename_format(Some(OutputFormat::Csv), Some(&raw), FieldSelector::new(None)),
            OutputFormat::Csv
        );

        let host_only = FieldSelector::new(FieldSpec::parse("host").ok());
        assert_eq!(filename_format(None, Some(&raw), host_only), OutputFormat::Json);
    }
}
