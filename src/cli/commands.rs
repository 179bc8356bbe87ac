//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shape stream sync client
#[derive(Parser, Debug)]
#[command(name = "shape-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Session configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Checkpoint file (JSON)
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume a shape over HTTP and print its events
    Follow {
        /// Base URL of the sync service (overrides config)
        #[arg(long)]
        url: Option<String>,

        /// Root table of the shape (overrides config)
        #[arg(long)]
        table: Option<String>,

        /// Row filter
        #[arg(long = "where")]
        where_clause: Option<String>,

        /// Keep long-polling after catching up
        #[arg(long)]
        live: bool,

        /// Ignore any stored checkpoint and start from scratch
        #[arg(long)]
        from_scratch: bool,

        /// Stop after this many events
        #[arg(long)]
        max_events: Option<usize>,

        /// Print unknown control messages
        #[arg(long)]
        show_controls: bool,
    },

    /// Run a JSON-lines file of raw messages through the engine
    Replay {
        /// Input file, one raw message per line
        input: PathBuf,

        /// Print the materialized rows instead of the events
        #[arg(long)]
        materialize: bool,

        /// Print unknown control messages
        #[arg(long)]
        show_controls: bool,
    },

    /// Show or clear a stored checkpoint
    Checkpoint {
        /// Shape name (all shapes when omitted)
        #[arg(long)]
        shape: Option<String>,

        /// Remove the checkpoint instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one event per line)
    Json,
    /// Human-readable output
    Pretty,
}
