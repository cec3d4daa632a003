//! AtlasCol Inspect Binary
//!
//! Prints the descriptor, page listings and entries of a stored store.

use std::path::PathBuf;
use std::process;

use atlascol::{ClusterCache, ReadOptions, Reader};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasCol store inspector
#[derive(Parser, Debug)]
#[command(name = "atlascol-inspect")]
#[command(about = "Inspect an AtlasCol store")]
#[command(version)]
struct Args {
    /// Store file
    #[arg(short, long)]
    file: PathBuf,

    /// Store name inside the file
    #[arg(short, long)]
    name: String,

    /// Read pages one at a time instead of whole clusters
    #[arg(long)]
    no_cluster_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Schema and cluster overview
    Summary,

    /// Page listing of one cluster
    Pages {
        /// Cluster id
        cluster: u64,
    },

    /// Print entries
    Dump {
        /// First entry to print
        #[arg(long, default_value = "0")]
        from: u64,

        /// Number of entries to print
        #[arg(long, default_value = "10")]
        count: u64,
    },

    /// Read every entry and print the read counters
    Scan,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlascol=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> atlascol::Result<()> {
    let options = ReadOptions::builder()
        .cluster_cache(if args.no_cluster_cache {
            ClusterCache::Off
        } else {
            ClusterCache::On
        })
        .build();
    let mut reader = Reader::open_with_options(&args.name, &args.file, options)?;

    match args.command {
        Commands::Summary => {
            print!("{}", reader.descriptor().summary());
        }
        Commands::Pages { cluster } => match reader.descriptor().page_listing(cluster) {
            Some(listing) => print!("{}", listing),
            None => println!("no cluster {}", cluster),
        },
        Commands::Dump { from, count } => {
            let end = from.saturating_add(count).min(reader.n_entries());
            for index in from..end {
                reader.load_entry(index)?;
                println!("* entry {}", index);
                for field in reader.model().fields() {
                    let value = reader.entry().value(&field.name)?;
                    println!("  {:<16} {:?}", field.name, value);
                }
            }
        }
        Commands::Scan => {
            for index in reader.entry_range() {
                reader.load_entry(index)?;
            }
            for (name, value) in reader.metrics().snapshot() {
                println!("{:<40} {}", name, value);
            }
        }
    }
    Ok(())
}
