use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dnslz_compression::{CodecConfig, DnslzError, FunctionMask, PipelineStats};
use log::debug;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Lossless pre-compressor for tab-delimited DNS query logs
#[derive(Parser)]
#[command(name = "dnslz")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Configuration file path (JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by both directions
#[derive(clap::Args)]
struct StreamArgs {
    /// Input file (use '-' for stdin)
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    input: String,

    /// Output file (use '-' for stdout)
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    output: String,

    /// Function mask, decimal or 0x-prefixed hex (0x7f enables every transform)
    #[arg(short, long, value_name = "MASK", value_parser = parse_mask)]
    mask: Option<FunctionMask>,

    /// Radix of base-N fields and manifests (2-61)
    #[arg(short, long, value_name = "N")]
    base: Option<u8>,

    /// Records per chunk
    #[arg(long, value_name = "N")]
    chunk_size: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a raw DNS query log
    Compress(StreamArgs),

    /// Restore a raw DNS query log from its compressed form
    Decompress(StreamArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = if let Some(config_path) = &cli.config {
        load_config(config_path)?
    } else {
        CodecConfig::default()
    };

    match cli.command {
        Commands::Compress(args) => compress_command(&args, config, cli.quiet)?,
        Commands::Decompress(args) => decompress_command(&args, config, cli.quiet)?,
    }

    Ok(())
}

/// Install env_logger; RUST_LOG overrides the level picked from the flags
fn setup_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Load configuration from a JSON file
fn load_config(path: &Path) -> Result<CodecConfig> {
    CodecConfig::from_json_file(path)
        .map_err(|e| map_dnslz_error(e, "Loading configuration"))
        .with_context(|| format!("Invalid configuration file: {}", path.display()))
}

/// Parse a function mask given in decimal or 0x hex
fn parse_mask(text: &str) -> std::result::Result<FunctionMask, String> {
    let bits = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    }
    .map_err(|e| format!("invalid mask {:?}: {}", text, e))?;
    Ok(FunctionMask::from_bits(bits))
}

/// Apply command-line overrides on top of the loaded configuration
fn effective_config(args: &StreamArgs, mut config: CodecConfig) -> Result<CodecConfig> {
    if let Some(mask) = args.mask {
        config.functions = mask;
    }
    if let Some(base) = args.base {
        config.base = base;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_capacity = chunk_size;
    }
    config
        .validate()
        .map_err(|e| map_dnslz_error(e, "Configuration"))?;
    debug!("configuration: {:?}", config);
    Ok(config)
}

/// Open input file or stdin
fn open_input(input: &str) -> Result<Box<dyn Read>> {
    if input == "-" {
        Ok(Box::new(io::stdin().lock()))
    } else {
        let file = File::open(input)
            .with_context(|| format!("Failed to open input file: {}", input))?;
        Ok(Box::new(file))
    }
}

/// Open output file or stdout
fn open_output(output: &str) -> Result<BufWriter<Box<dyn Write>>> {
    let sink: Box<dyn Write> = if output == "-" {
        Box::new(io::stdout().lock())
    } else {
        let file = File::create(output)
            .with_context(|| format!("Failed to create output file: {}", output))?;
        Box::new(file)
    };
    Ok(BufWriter::new(sink))
}

/// Execute the compress command
fn compress_command(args: &StreamArgs, config: CodecConfig, quiet: bool) -> Result<()> {
    let config = effective_config(args, config)?;
    debug!("compressing {} to {}", args.input, args.output);

    let reader = open_input(&args.input)?;
    let writer = open_output(&args.output)?;
    let stats = dnslz_compression::compress(&config, reader, writer)
        .map_err(|e| map_dnslz_error(e, "Compression"))?;

    if !quiet {
        eprintln!(
            "Compressed {} bytes to {} bytes ({} records, {} chunks, ratio: {:.3})",
            stats.bytes_read,
            stats.bytes_written,
            stats.records,
            stats.chunks,
            stats.ratio()
        );
    }
    Ok(())
}

/// Execute the decompress command
fn decompress_command(args: &StreamArgs, config: CodecConfig, quiet: bool) -> Result<()> {
    let config = effective_config(args, config)?;
    debug!("decompressing {} to {}", args.input, args.output);

    let reader = open_input(&args.input)?;
    let writer = open_output(&args.output)?;
    let stats: PipelineStats = dnslz_compression::decompress(&config, reader, writer)
        .map_err(|e| map_dnslz_error(e, "Decompression"))?;

    if !quiet {
        eprintln!(
            "Decompressed {} bytes to {} bytes ({} records, {} chunks)",
            stats.bytes_read, stats.bytes_written, stats.records, stats.chunks
        );
    }
    Ok(())
}

/// Map DnslzError to anyhow::Error with context
fn map_dnslz_error(error: DnslzError, context: &str) -> anyhow::Error {
    match error {
        DnslzError::Io(e) => anyhow::anyhow!("{}: I/O error: {}", context, e),
        DnslzError::MalformedRecord { line, reason } => {
            anyhow::anyhow!("{}: malformed record at line {}: {}", context, line, reason)
        }
        DnslzError::ConfigMismatch { reason } => anyhow::anyhow!(
            "{}: input does not match the configuration \
             (check --mask, --base and --chunk-size): {}",
            context,
            reason
        ),
        DnslzError::InvalidConfig(reason) => {
            anyhow::anyhow!("{}: invalid configuration: {}", context, reason)
        }
        other => anyhow::anyhow!("{}: {}", context, other),
    }
}
