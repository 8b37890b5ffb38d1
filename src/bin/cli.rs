//! HashKV CLI
//!
//! Operator tool that opens a data directory directly.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hashkv::segment::{Segment, SegmentRead};
use hashkv::{Config, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// HashKV CLI
#[derive(Parser, Debug)]
#[command(name = "hashkv")]
#[command(about = "Inspect and modify a HashKV data directory")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./hashkv_data")]
    data_dir: PathBuf,

    /// Active segment size in bytes before rotation
    #[arg(short, long, default_value = "1024000")]
    max_file_size: u64,

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

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Compact all sealed segments now
    Compact,

    /// Scan every segment and report damaged tails
    Verify,

    /// Print key and segment counts
    Stats,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hashkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> hashkv::Result<()> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .maximum_file_size(args.max_file_size)
        .disable_compaction()
        .build();

    let store = Store::open(config)?;

    let result = match args.command {
        Commands::Get { key } => store.get(&key).map(|value| match value {
            Some(value) => println!("{}", value),
            None => println!("(not found)"),
        }),
        Commands::Put { key, value } => store.put(&key, &value),
        Commands::Del { key } => store.delete(&key),
        Commands::Compact => store.do_compaction().map(|stats| {
            println!(
                "merged {} segments ({} pairs), {} live keys",
                stats.segments_merged, stats.pairs, stats.keys_written
            );
        }),
        Commands::Verify => verify(&store),
        Commands::Stats => {
            println!("keys:      {}", store.len());
            println!("segments:  {}", store.segment_count());
            println!("active:    {}", store.active_segment_name());
            Ok(())
        }
    };

    store.close()?;
    result
}

/// Scan every segment except the one this run just created
fn verify(store: &Store) -> hashkv::Result<()> {
    let active = store.active_segment_name();

    for name in store.segment_names() {
        if name == active {
            continue;
        }
        let segment = Segment::open(store.data_dir(), name)?;
        let summary = segment.verify()?;
        println!(
            "{:<20} records={:<8} tombstones={:<8} bytes={:<10} {:?}",
            name.to_string(),
            summary.records,
            summary.tombstones,
            summary.valid_bytes,
            summary.stop
        );
    }

    Ok(())
}
