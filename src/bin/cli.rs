use clap::Parser;
use scalable_bloom_rs::{
    DEFAULT_BLOCK_SIZE, DEFAULT_CAPACITY, DEFAULT_ERROR_RATE, Deduplicator,
    EphemeralFilter, FilterConfigBuilder, OffsetLog, OutputSink, RunMode,
    ScalingBloomFilter,
};
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Deduplicate a stream of fixed-size blocks against a scaling Bloom
/// filter. By default reads from stdin, writes to stdout and tracks
/// duplicates with a temporary filter that is discarded afterwards.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input file, defaults to stdin
    infile: Option<PathBuf>,

    /// Output file, defaults to stdout
    outfile: Option<PathBuf>,

    /// Path to the bloom filter file to check against
    #[arg(short, long)]
    bloom: Option<PathBuf>,

    /// Add blocks to the bloom file
    #[arg(short, long, conflicts_with = "delete")]
    add: bool,

    /// Remove blocks from the bloom file
    #[arg(short, long)]
    delete: bool,

    /// Write an input/output offset correlation log to this path
    #[arg(long)]
    offset_log: Option<PathBuf>,

    /// Block size in bytes
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Filter capacity used when creating a new bloom file
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Target false positive rate used when creating a new bloom file
    #[arg(long, default_value_t = DEFAULT_ERROR_RATE)]
    error_rate: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays a clean data channel.
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.block_size == 0 {
        return Err("block size must be > 0".into());
    }

    let config = FilterConfigBuilder::default()
        .capacity(cli.capacity)
        .error_rate(cli.error_rate)
        .build()?;
    config.validate()?;

    // Resolve the named filter once, mirroring the classic fallback
    // chain: load an existing file, create it only with --add, warn and
    // fall back to the ephemeral filter otherwise.
    let named = match &cli.bloom {
        Some(path) if path.is_file() => {
            Some(ScalingBloomFilter::load(path)?)
        }
        Some(path) if cli.add => {
            let filter = ScalingBloomFilter::create(config.clone(), path)?;
            info!("created bloom at {}", path.display());
            Some(filter)
        }
        Some(path) => {
            warn!(
                "bloom file {} does not exist and cannot be created \
                 without --add",
                path.display()
            );
            None
        }
        None => {
            if cli.add {
                warn!("--add ignored without a bloom file");
            }
            None
        }
    };

    let mode = if cli.delete {
        RunMode::Delete
    } else if cli.add && named.is_some() {
        RunMode::FilterWithAdd
    } else {
        RunMode::Filter
    };

    let input: Box<dyn Read> = match &cli.infile {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };
    let output = match &cli.outfile {
        Some(path) => OutputSink::File(File::create(path)?),
        None => OutputSink::Stream(Box::new(io::stdout())),
    };

    let mut dedup = Deduplicator::new(input, output, cli.block_size);
    if let Some(log_path) = &cli.offset_log {
        let input_name = cli
            .infile
            .as_ref()
            .map_or("stdin".to_string(), |p| p.display().to_string());
        let output_name = cli
            .outfile
            .as_ref()
            .map_or("stdout".to_string(), |p| p.display().to_string());
        let log = OffsetLog::create(
            log_path,
            &input_name,
            &output_name,
            cli.bloom.as_deref(),
        )?;
        dedup = dedup.with_offset_log(log);
    }

    match mode {
        RunMode::Delete => {
            let Some(mut filter) = named else {
                return Err(
                    "--delete requires an existing bloom file (-b)".into()
                );
            };
            let stats = dedup.remove(&mut filter)?;
            filter.persist()?;
            info!(
                blocks_read = stats.blocks_read,
                blocks_deleted = stats.blocks_deleted,
                "delete run complete"
            );
        }
        RunMode::FilterWithAdd => {
            let Some(mut filter) = named else {
                unreachable!("add mode requires a named filter");
            };
            let stats = dedup.filter_with_add(&mut filter)?;
            filter.persist()?;
            info!(
                blocks_read = stats.blocks_read,
                blocks_written = stats.blocks_written,
                "dedup run complete"
            );
        }
        RunMode::Filter => {
            let mut seen = EphemeralFilter::new(config)?;
            let stats = dedup.filter(&mut seen, named.as_ref())?;
            info!(
                blocks_read = stats.blocks_read,
                blocks_written = stats.blocks_written,
                "dedup run complete"
            );
        }
    }

    Ok(())
}
