//! CLI argument parsing for slicer

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "slicer")]
#[command(author, version, about = "Cooperative time-sliced task scheduling", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Output format for the run summary
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process items one per tick
    Chunk {
        /// Number of items to process
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Delay before each tick in milliseconds (default: config)
        #[arg(short, long)]
        tick_delay_ms: Option<u64>,

        /// Item indexes that should fail, to show failure isolation
        #[arg(long, value_delimiter = ',')]
        fail: Vec<usize>,
    },

    /// Process items in budgeted batches
    Batch {
        /// Number of items to process
        #[arg(short = 'n', long, default_value = "1000")]
        count: usize,

        /// Delay before each tick in milliseconds (default: config)
        #[arg(short, long)]
        tick_delay_ms: Option<u64>,

        /// Per-tick budget in milliseconds (default: config)
        #[arg(short, long)]
        budget_ms: Option<u64>,

        /// Simulated blocking work per item in microseconds
        #[arg(short, long, default_value = "200")]
        work_us: u64,
    },

    /// Animate a value between two endpoints
    Animate {
        /// Start value
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        from: f64,

        /// End value
        #[arg(long, default_value = "100", allow_negative_numbers = true)]
        to: f64,

        /// Duration in milliseconds
        #[arg(short, long, default_value = "500")]
        duration_ms: u64,

        /// Print every step, not only the summary
        #[arg(short, long)]
        verbose: bool,
    },

    /// Schedule keyed delayed tasks
    Delay {
        /// Task ids; repeated ids run only once
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,

        /// Delay in milliseconds (default: config)
        #[arg(short, long)]
        delay_ms: Option<u64>,

        /// Ids to stop and forget right after scheduling
        #[arg(long, value_delimiter = ',')]
        forget: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delay_ids() {
        let cli = Cli::parse_from(["slicer", "delay", "a,b,a", "--forget", "b", "-d", "5"]);
        match cli.command {
            Command::Delay { ids, delay_ms, forget } => {
                assert_eq!(ids, vec!["a", "b", "a"]);
                assert_eq!(delay_ms, Some(5));
                assert_eq!(forget, vec!["b"]);
            }
            other => panic!("Expected Delay, got {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["slicer", "animate", "--from", "-5", "--format", "json", "-l", "debug"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Animate { from, to, .. } => {
                assert_eq!(from, -5.0);
                assert_eq!(to, 100.0);
            }
            other => panic!("Expected Animate, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
