//! CLI for paster.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_checksum, run_fetch, run_inspect, FetchOverrides};

/// Top-level CLI for paster.
#[derive(Debug, Parser)]
#[command(name = "paster")]
#[command(about = "paster: fetch image fragments from redundant servers and reassemble them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch every fragment of an image and write the reassembled PNG.
    Fetch {
        /// Number of concurrent fetch workers (1-20).
        #[arg(short = 't', long = "threads", value_name = "N", value_parser = clap::value_parser!(u8).range(1..=20))]
        threads: Option<u8>,
        /// Image to fetch (1-3).
        #[arg(short = 'n', long = "image", value_name = "IMG", value_parser = clap::value_parser!(u32).range(1..=3))]
        image: Option<u32>,
        /// Output PNG path.
        #[arg(short = 'o', long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
        /// Number of fragments the image is split into.
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
        fragments: Option<u32>,
        /// Origin server base URL. Repeat for several; replaces the configured list.
        #[arg(long = "server", value_name = "URL")]
        servers: Vec<String>,
        /// Accept fragments with CRC mismatches (logged and flagged) instead of refetching.
        #[arg(long)]
        accept_corrupt: bool,
    },

    /// Decode a PNG and list its chunks with CRC status.
    Inspect {
        /// Path to the PNG file.
        path: PathBuf,
    },

    /// Compute SHA-256 of a file (e.g. after a fetch).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Fetch {
                threads,
                image,
                output,
                fragments,
                servers,
                accept_corrupt,
            } => {
                let overrides = FetchOverrides {
                    workers: threads.map(usize::from),
                    image,
                    output,
                    fragment_count: fragments.map(|n| n as usize),
                    servers,
                    accept_corrupt,
                };
                run_fetch(overrides).await?
            }
            CliCommand::Inspect { path } => run_inspect(&path).await?,
            CliCommand::Checksum { path } => run_checksum(&path).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
