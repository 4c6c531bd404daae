//! CLI for the hubfetch repository downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hubfetch_core::config;
use std::path::Path;

use commands::{run_checksum, run_file, run_snapshot};

/// Top-level CLI for the hubfetch downloader.
#[derive(Debug, Parser)]
#[command(name = "hubfetch")]
#[command(about = "hubfetch: resumable model/dataset repository downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a single file from a repository into the local cache.
    File {
        /// Repository id, `group/name` or bare `name`.
        repo: String,
        /// Repo-relative path of the file.
        path: String,
        /// Branch, tag or commit id.
        #[arg(long, default_value = "master")]
        revision: String,
        /// Repository kind: model or dataset.
        #[arg(long, default_value = "model")]
        kind: String,
        /// Wait for competing downloads instead of skipping locked files.
        #[arg(long)]
        wait: bool,
    },

    /// Download a snapshot of a repository tree into the local cache.
    Snapshot {
        /// Repository id, `group/name` or bare `name`.
        repo: String,
        /// Branch, tag or commit id.
        #[arg(long, default_value = "master")]
        revision: String,
        /// Repository kind: model or dataset.
        #[arg(long, default_value = "model")]
        kind: String,
        /// Keep only paths matching these glob patterns (repeatable).
        #[arg(long = "allow", value_name = "PATTERN")]
        allow: Vec<String>,
        /// Drop paths matching these glob patterns (repeatable).
        #[arg(long = "ignore", value_name = "PATTERN")]
        ignore: Vec<String>,
        /// Wait for competing downloads instead of skipping locked files.
        #[arg(long)]
        wait: bool,
    },

    /// Compute SHA-256 of a local file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::File {
                repo,
                path,
                revision,
                kind,
                wait,
            } => run_file(&cfg, &repo, &path, &revision, &kind, wait)?,
            CliCommand::Snapshot {
                repo,
                revision,
                kind,
                allow,
                ignore,
                wait,
            } => run_snapshot(&cfg, &repo, &revision, &kind, allow, ignore, wait)?,
            CliCommand::Checksum { path } => run_checksum(Path::new(&path))?,
        }

        Ok(())
    }
}
