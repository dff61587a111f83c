//! CLI for recording, inspecting and replaying match captures.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_inspect, run_play, run_record, run_regions, RecordArgs};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "aof")]
#[command(about = "Record live matches from the spectator service and replay them locally", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Capture a running match until it ends.
    Record {
        /// Region id or short name (e.g. 1 or EUW).
        region: String,

        /// Match id.
        match_id: u64,

        /// Game client version, major.minor.patch.
        #[arg(long, value_name = "X.Y.Z")]
        client_version: String,

        /// Base64 encryption key handed out by the spectator service.
        #[arg(long)]
        key: String,

        /// JSON file with the player roster.
        #[arg(long, value_name = "FILE")]
        roster: Option<PathBuf>,

        /// Print progress as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Serve a container to the game client until interrupted.
    Play {
        /// Path to the .aof file.
        path: PathBuf,
    },

    /// Print header, roster and segment summary of a container.
    Inspect {
        /// Path to the .aof file.
        path: PathBuf,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List known spectator regions.
    Regions,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Record {
                region,
                match_id,
                client_version,
                key,
                roster,
                json,
            } => {
                run_record(RecordArgs {
                    region,
                    match_id,
                    client_version,
                    key,
                    roster,
                    json,
                })
                .await?
            }
            CliCommand::Play { path } => run_play(&path).await?,
            CliCommand::Inspect { path, json } => run_inspect(&path, json)?,
            CliCommand::Regions => run_regions(),
        }

        Ok(())
    }
}
