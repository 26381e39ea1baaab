use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Check that dynamic-DNS hosts resolve and answer over HTTP
#[derive(Debug, Parser)]
#[command(name = "dyncheck", version)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/dyncheck/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output on stderr (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less log output on stderr (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List monitored hosts
    Hosts,

    /// Add a host to the monitored list
    Add {
        host: String,
    },

    /// Check one host now, or every monitored host
    Check {
        /// Host to check; need not be in the monitored list
        host: Option<String>,
    },

    /// Show the most recent check records, oldest first
    Tail {
        #[arg(short = 'n', long, default_value_t = 10)]
        lines: usize,

        /// Print newest-first display lines instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// Response times of the most recent checks, for charting
    Series {
        #[arg(short = 'n', long, default_value_t = 30)]
        points: usize,
    },

    /// Health counts and timing over the most recent checks
    Summary {
        #[arg(short = 'n', long, default_value_t = 100)]
        records: usize,
    },

    /// Re-check hosts on a fixed interval until interrupted
    Watch {
        /// Seconds between rounds (default: schedule.interval_seconds)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Hosts to watch (default: every monitored host)
        hosts: Vec<String>,
    },

    /// Write the whole check log to stdout as CSV
    Export,

    /// Print the effective configuration
    Config,
}
