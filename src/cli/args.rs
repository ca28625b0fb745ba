//! CLI argument definitions.

use super::validators::{parse_threshold, parse_tolerance};
use crate::config::ScanMode;
use crate::constants::comparator::DEFAULT_MAX_OFFSET;
use crate::model::ErrorType;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Near-duplicate audio detection across catalogs using perceptual
/// fingerprints.
#[derive(Debug, Parser)]
#[command(name = "dupescan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: platform config directory).
    #[arg(long, global = true, env = "DUPESCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors; no progress bars.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable progress bars.
    #[arg(long, global = true)]
    pub no_progress: bool,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan a fingerprint feed for duplicates.
    Scan(ScanArgs),
    /// Analyze an error file and retry the failed pairs.
    Retry(RetryArgs),
    /// Summarize a match file.
    Stats {
        /// Match file (JSON Lines).
        input: PathBuf,
    },
    /// Convert a match file to CSV.
    Export {
        /// Match file (JSON Lines).
        input: PathBuf,
        /// CSV destination (default: input with a .csv extension).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write a UTF-8 byte order mark for spreadsheet applications.
        #[arg(long)]
        bom: bool,
    },
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Serve comparisons over stdin/stdout (started by the process pool).
    #[command(hide = true)]
    Worker(WorkerArgs),
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Options shared by commands that run comparisons.
#[derive(Debug, Clone, Args)]
pub struct PoolArgs {
    /// Comparison worker processes (default: 90% of logical cores).
    #[arg(short, long, env = "DUPESCAN_WORKERS")]
    pub workers: Option<usize>,

    /// Records buffered per sink before flushing.
    #[arg(short, long, env = "DUPESCAN_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Compare on threads inside this process instead of worker processes.
    #[arg(long)]
    pub inline: bool,
}

/// Arguments for the scan command.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Fingerprint feed (JSON Lines).
    pub input: PathBuf,

    /// Which source combinations to compare.
    #[arg(short, long, value_enum, env = "DUPESCAN_MODE")]
    pub mode: Option<ScanMode>,

    /// Minimum similarity recorded as a match (0.0-1.0).
    #[arg(short, long, value_parser = parse_threshold, env = "DUPESCAN_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Duration clustering tolerance in seconds.
    #[arg(long, value_parser = parse_tolerance, env = "DUPESCAN_TOLERANCE")]
    pub tolerance: Option<f64>,

    /// Match output (default: duplicate_results_<mode>.jsonl).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Ignore and delete any checkpoint; start a fresh sweep.
    #[arg(long)]
    pub no_resume: bool,

    /// Only use the N shortest records.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Earlier match files whose pairs are skipped.
    #[arg(long, value_name = "FILE")]
    pub known: Vec<PathBuf>,

    /// Remove a lock left behind by a crashed run before starting.
    #[arg(long)]
    pub force_unlock: bool,

    /// Worker pool options.
    #[command(flatten)]
    pub pool: PoolArgs,
}

/// Arguments for the retry command.
#[derive(Debug, Args)]
pub struct RetryArgs {
    /// Error file from a previous scan (JSON Lines).
    pub error_file: PathBuf,

    /// Print the analysis and stop.
    #[arg(long)]
    pub analyze_only: bool,

    /// Only retry errors of this type (COMPARISON_FAILED or EXCEPTION).
    #[arg(long)]
    pub filter_type: Option<ErrorType>,

    /// Fingerprint feed the failed pairs came from.
    #[arg(short, long, required_unless_present = "analyze_only")]
    pub input: Option<PathBuf>,

    /// Output for recovered comparisons; new failures go to its
    /// `_errors.jsonl` sibling.
    #[arg(short, long, required_unless_present = "analyze_only")]
    pub output: Option<PathBuf>,

    /// Worker pool options.
    #[command(flatten)]
    pub pool: PoolArgs,
}

/// Arguments for the hidden worker command.
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Alignment search window in frames.
    #[arg(long, default_value_t = DEFAULT_MAX_OFFSET)]
    pub max_offset: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_scan() {
        let cli = Cli::try_parse_from(["dupescan", "scan", "feed.jsonl"]).unwrap();
        let Command::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.input, PathBuf::from("feed.jsonl"));
        assert!(args.mode.is_none());
        assert!(!args.no_resume);
    }

    #[test]
    fn test_cli_parse_scan_with_options() {
        let cli = Cli::try_parse_from([
            "dupescan",
            "scan",
            "feed.jsonl",
            "--mode",
            "same-source",
            "-t",
            "0.9",
            "--tolerance",
            "2.5",
            "-w",
            "4",
            "--known",
            "a.jsonl",
            "--known",
            "b.jsonl",
            "-q",
        ])
        .unwrap();
        assert!(cli.quiet);
        let Command::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.mode, Some(ScanMode::SameSource));
        assert_eq!(args.threshold, Some(0.9));
        assert_eq!(args.tolerance, Some(2.5));
        assert_eq!(args.pool.workers, Some(4));
        assert_eq!(args.known.len(), 2);
    }

    #[test]
    fn test_cli_rejects_bad_threshold_and_mode() {
        assert!(Cli::try_parse_from(["dupescan", "scan", "f", "-t", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["dupescan", "scan", "f", "--tolerance", "0"]).is_err());
        assert!(Cli::try_parse_from(["dupescan", "scan", "f", "--mode", "sideways"]).is_err());
    }

    #[test]
    fn test_cli_parse_retry() {
        let cli = Cli::try_parse_from([
            "dupescan",
            "retry",
            "errors.jsonl",
            "--input",
            "feed.jsonl",
            "--output",
            "retry.jsonl",
            "--filter-type",
            "EXCEPTION",
        ])
        .unwrap();
        let Command::Retry(args) = cli.command else {
            panic!("expected retry");
        };
        assert_eq!(args.filter_type, Some(ErrorType::Exception));
    }

    #[test]
    fn test_cli_retry_requires_output_unless_analyze_only() {
        assert!(Cli::try_parse_from(["dupescan", "retry", "errors.jsonl"]).is_err());
        assert!(Cli::try_parse_from(["dupescan", "retry", "errors.jsonl", "--analyze-only"]).is_ok());
    }

    #[test]
    fn test_cli_parse_config_subcommand() {
        let cli = Cli::try_parse_from(["dupescan", "config", "show"]);
        assert!(cli.is_ok());
    }
}
