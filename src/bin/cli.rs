//! HashLog CLI
//!
//! Opens a data directory, runs a single operation against it, and closes.

use std::process::ExitCode;

use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use hashlog::{Config, Engine, HashLogError};
use tracing_subscriber::{fmt, EnvFilter};

/// HashLog CLI
#[derive(Parser, Debug)]
#[command(name = "hashlog-cli")]
#[command(about = "Operate on a HashLog data directory")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./hashlog_data")]
    data_dir: String,

    /// Segment size limit in KiB before rotation
    #[arg(short = 's', long, default_value = "10240")]
    segment_size_kb: u64,

    /// Segment count above which compaction runs (0 disables)
    #[arg(short = 'c', long, default_value = "2")]
    compaction_threshold: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set (must not be empty)
        #[arg(value_parser = NonEmptyStringValueParser::new())]
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Merge all immutable segments
    Compact,

    /// Show per-segment sizes and key counts
    Stats,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hashlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .segment_size_limit(args.segment_size_kb * 1024)
        .compaction_threshold(match args.compaction_threshold {
            0 => None,
            n => Some(n),
        })
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = run(&engine, args.command);
    let closed = engine.close();

    match (outcome, closed) {
        (Ok(()), Ok(())) => ExitCode::SUCCESS,
        (Err(HashLogError::KeyNotFound), _) => {
            eprintln!("(not found)");
            ExitCode::from(2)
        }
        (Err(e), _) | (Ok(()), Err(e)) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(engine: &Engine, command: Commands) -> hashlog::Result<()> {
    match command {
        Commands::Get { key } => {
            let value = engine.get(&key)?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        // Empty values are refused at argument parsing, not by the engine
        Commands::Put { key, value } => engine.put(&key, &value)?,
        Commands::Del { key } => engine.delete(&key)?,
        Commands::Compact => match engine.compact()? {
            Some(report) => println!(
                "merged {:?} into segment-{}: {} live keys, {} dropped, {} -> {} bytes",
                report.merged_ids,
                report.output_id,
                report.live_keys,
                report.dropped_keys,
                report.bytes_before,
                report.bytes_after
            ),
            None => println!("nothing to compact"),
        },
        Commands::Stats => {
            let stats = engine.stats();
            for segment in &stats.segments {
                println!(
                    "segment-{:<6} {:>12} bytes {:>8} keys{}",
                    segment.id,
                    segment.size,
                    segment.keys,
                    if segment.is_tail { "  (tail)" } else { "" }
                );
            }
            println!(
                "{} segments, {} bytes",
                stats.segment_count(),
                stats.total_size()
            );
        }
    }
    Ok(())
}
