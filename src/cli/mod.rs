//! CLI command definitions for task-publish
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod list;
pub mod queue;

use clap::{Parser, Subcommand};
use list::ListArgs;
use queue::QueueCommand;

/// Publish markdown tasks as a web page and sync edits back
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Vault root directory (overrides config)
    #[arg(long, global = true)]
    pub vault: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render the publish page and push it once
    Publish,

    /// Apply queued page edits to the vault once
    Sync(SyncArgs),

    /// Print tasks from the vault, optionally filtered by a query
    List(ListArgs),

    /// Queue an edit for the next sync
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Keep running: startup sync, periodic sync, config reload
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Output format: json or markdown
    #[arg(long, default_value = "markdown")]
    pub format: String,

    /// Also list documents with tasks changed since the previous sync
    #[arg(long)]
    pub show_modified: bool,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Serve the HTTP intake for page edits (overrides config)
    #[arg(long)]
    pub intake: bool,

    /// Intake port (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Publish once after the startup sync
    #[arg(long)]
    pub publish: bool,
}
