//! Dupescan - near-duplicate audio detection across catalogs.
//!
//! Fingerprints are grouped by duration, candidate pairs inside each group
//! are compared on a pool of workers, and matches above a similarity
//! threshold are appended to a JSON Lines file. Runs checkpoint after every
//! duration cluster and can be interrupted and resumed.

#![warn(missing_docs)]

pub mod checkpoint;
pub mod cli;
pub mod compare;
pub mod config;
pub mod constants;
pub mod error;
pub mod input;
pub mod locking;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod retry;
pub mod store;

use checkpoint::{CheckpointManager, CheckpointSettings};
use clap::Parser;
use cli::{Cli, Command, PoolArgs, RetryArgs, ScanArgs, WorkerArgs};
use compare::{
    CancelToken, InProcessPool, ParallelCompare, ProcessPool, RawFingerprintComparator,
    WorkerCommand, default_worker_count,
};
use config::{
    ComparatorConfig, Config, ScanConfig, ScanMode, checkpoint_path_for, config_file_path,
    default_output_path, error_path_for, load_config, save_default_config, validate_comparator,
    validate_scan,
};
use locking::RunLock;
use output::{ErrorSink, MatchStats, ResultSink};
use pipeline::{
    Classifier, ComparisonScheduler, RunPhase, RunReport, ScanSettings, cluster_by_duration,
    pair_count,
};
use retry::{ErrorAnalysis, build_replay_pairs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use store::{DeduplicationGuard, JsonlMatchStore};
use tracing::{debug, info, warn};

pub use error::{Error, Result};

/// Main entry point for the dupescan CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Workers talk JSON on stdout; their logs must stay on stderr.
    if let Command::Worker(args) = &cli.command {
        init_logging(cli.verbose, cli.verbose == 0, true);
        return run_worker(args);
    }

    init_logging(cli.verbose, cli.quiet, false);
    let progress = !cli.quiet && !cli.no_progress;
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Scan(args) => {
            let config = load_config(config_path)?;
            run_scan(&args, &config, progress)
        }
        Command::Retry(args) => {
            let config = load_config(config_path)?;
            run_retry(&args, &config, progress)
        }
        Command::Stats { input } => {
            let stats = MatchStats::from_file(&input)?;
            println!("{stats}");
            Ok(())
        }
        Command::Export { input, output, bom } => {
            let output = output.unwrap_or_else(|| input.with_extension("csv"));
            let summary = output::export_matches_csv(&input, &output, bom)?;
            info!(
                "Exported {} match(es) to {} ({} invalid line(s) skipped)",
                summary.rows,
                output.display(),
                summary.skipped
            );
            Ok(())
        }
        Command::Config { action } => handle_config_command(action, config_path),
        Command::Worker(_) => Ok(()),
    }
}

fn init_logging(verbose: u8, quiet: bool, to_stderr: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter_str = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let result = if to_stderr {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        eprintln!("failed to initialize logging: {e}");
    }
}

/// First Ctrl+C requests a graceful stop, the second exits immediately.
fn install_interrupt_handler(cancel: CancelToken) {
    if let Err(e) = ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            locking::cleanup_all_locks();
            std::process::exit(130); // 128 + SIGINT(2)
        }
        warn!("Interrupt received, finishing in-flight comparisons (Ctrl+C again to abort)");
    }) {
        warn!("Failed to install Ctrl+C handler: {e}");
    }
}

/// Scan settings after applying command-line overrides to the config file.
fn merge_scan_config(args: &ScanArgs, config: &Config) -> ScanConfig {
    let mut scan = config.scan.clone();
    if let Some(mode) = args.mode {
        scan.mode = mode;
    }
    if let Some(threshold) = args.threshold {
        scan.similarity_threshold = threshold;
    }
    if let Some(tolerance) = args.tolerance {
        scan.duration_tolerance = tolerance;
    }
    apply_pool_args(&args.pool, &mut scan);
    if args.no_resume {
        scan.resume = false;
    }
    scan
}

fn apply_pool_args(pool: &PoolArgs, scan: &mut ScanConfig) {
    if let Some(workers) = pool.workers {
        scan.workers = workers;
    }
    if let Some(batch_size) = pool.batch_size {
        scan.batch_size = batch_size;
    }
}

fn start_pool(
    inline: bool,
    workers: usize,
    config: &Config,
    cancel: &CancelToken,
) -> Result<Box<dyn ParallelCompare>> {
    let workers = if workers == 0 {
        default_worker_count()
    } else {
        workers
    };
    let max_offset = config.comparator.max_offset;

    if inline {
        info!("Comparing on {workers} thread(s)");
        let pool = InProcessPool::start(
            workers,
            move || RawFingerprintComparator::new(max_offset),
            cancel,
        )?;
        Ok(Box::new(pool))
    } else {
        info!("Starting {workers} comparison worker(s)");
        let command = WorkerCommand::current_exe(max_offset)?;
        Ok(Box::new(ProcessPool::start(workers, &command, cancel)?))
    }
}

fn open_sinks(output: &Path, batch_size: usize) -> (ResultSink, ErrorSink) {
    let errors = error_path_for(output);
    info!("Matches: {}", output.display());
    info!("Errors: {}", errors.display());
    (
        ResultSink::matches(output, batch_size),
        ErrorSink::errors(&errors, batch_size),
    )
}

fn run_scan(args: &ScanArgs, config: &Config, progress: bool) -> Result<()> {
    let scan = merge_scan_config(args, config);
    validate_scan(&scan)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(scan.mode));

    if args.force_unlock {
        if let Some(holder) = RunLock::holder(&output) {
            warn!(
                "Removing lock held by pid {} on {} since {}",
                holder.pid, holder.hostname, holder.started
            );
        }
        RunLock::remove_stale(&output)?;
    }
    let _lock = RunLock::acquire(&output)?;

    let cancel = CancelToken::default();
    install_interrupt_handler(Arc::clone(&cancel));

    let mut known = vec![output.clone()];
    known.extend(args.known.iter().cloned());
    let guard = DeduplicationGuard::preload(Box::new(JsonlMatchStore::new(known)))?;

    let (results, errors) = open_sinks(&output, scan.batch_size);
    let pool = start_pool(args.pool.inline, scan.workers, config, &cancel)?;
    let checkpoint = CheckpointManager::new(
        checkpoint_path_for(&output),
        CheckpointSettings {
            mode: scan.mode,
            similarity_threshold: scan.similarity_threshold,
            duration_tolerance: scan.duration_tolerance,
        },
    );
    let settings = ScanSettings {
        mode: scan.mode,
        similarity_threshold: scan.similarity_threshold,
        resume: scan.resume,
    };
    let mut scheduler = ComparisonScheduler::new(
        pool,
        guard,
        results,
        errors,
        Classifier::new(config.classification),
        settings,
    )
    .with_checkpoint(checkpoint)
    .with_cancel(cancel)
    .with_progress(progress);

    scheduler.advance(RunPhase::LoadingData)?;
    let loaded = input::load_records(&args.input, args.limit)?;
    if loaded.records.len() < 2 {
        return Err(Error::NotEnoughRecords {
            found: loaded.records.len(),
        });
    }

    scheduler.advance(RunPhase::Clustering)?;
    let clusters = cluster_by_duration(&loaded.records, scan.duration_tolerance);
    let clustered: usize = clusters.iter().map(pipeline::Cluster::len).sum();
    let cluster_pairs: usize = clusters.iter().map(pipeline::Cluster::pair_count).sum();
    info!(
        "{} record(s) in {} cluster(s) (tolerance {}s)",
        clustered,
        clusters.len(),
        scan.duration_tolerance
    );

    let report = scheduler.run(&clusters)?;

    print_scan_summary(&ScanSummary {
        mode: scan.mode,
        output: &output,
        records: loaded.records.len(),
        rejected: loaded.rejected,
        clustered,
        brute_force_pairs: pair_count(loaded.records.len()),
        cluster_pairs,
        report: &report,
    });

    report.into_result().map(|_| ())
}

struct ScanSummary<'a> {
    mode: ScanMode,
    output: &'a Path,
    records: usize,
    rejected: usize,
    clustered: usize,
    brute_force_pairs: usize,
    cluster_pairs: usize,
    report: &'a RunReport,
}

#[allow(clippy::cast_precision_loss)]
fn print_scan_summary(summary: &ScanSummary<'_>) {
    let report = summary.report;
    let stats = report.stats;

    println!();
    println!("Scan summary ({})", summary.mode);
    println!("  Records loaded:     {}", summary.records);
    if summary.rejected > 0 {
        println!("  Records rejected:   {}", summary.rejected);
    }
    println!("  Records clustered:  {}", summary.clustered);
    println!(
        "  Clusters:           {}/{} ({} resumed)",
        report.clusters_done(),
        report.clusters_total,
        report.clusters_resumed
    );
    println!("  Brute-force pairs:  {}", summary.brute_force_pairs);
    println!("  Clustered pairs:    {}", summary.cluster_pairs);
    if summary.brute_force_pairs > 0 {
        let gain = 100.0 * (1.0 - summary.cluster_pairs as f64 / summary.brute_force_pairs as f64);
        println!("  Efficiency gain:    {gain:.1}%");
    }
    println!("  Candidate pairs:    {}", report.candidate_pairs);
    println!("  Comparisons:        {}", stats.comparisons);
    println!("  Duplicates:         {}", stats.duplicates);
    println!("  Skipped (known):    {}", stats.skipped);
    println!("  Errors:             {}", stats.errors);
    println!("  Elapsed:            {:.1}s", report.elapsed.as_secs_f64());
    println!("  Output:             {}", summary.output.display());
    if stats.errors > 0 {
        println!(
            "  {} comparison(s) failed; see {} or run 'dupescan retry'",
            stats.errors,
            error_path_for(summary.output).display()
        );
    }
}

fn run_retry(args: &RetryArgs, config: &Config, progress: bool) -> Result<()> {
    let analysis = ErrorAnalysis::from_file(&args.error_file)?;
    println!("{analysis}");

    if args.analyze_only {
        return Ok(());
    }
    let (Some(input_path), Some(output)) = (args.input.as_deref(), args.output.as_deref()) else {
        return Err(Error::ConfigValidation {
            message: "retry needs --input and --output unless --analyze-only is given".to_string(),
        });
    };

    let selected = analysis.select(args.filter_type);
    if selected.is_empty() {
        info!("Nothing to retry");
        return Ok(());
    }

    let mut scan = config.scan.clone();
    apply_pool_args(&args.pool, &mut scan);
    validate_scan(&scan)?;

    let loaded = input::load_records(input_path, None)?;
    let index = input::index_by_id(&loaded.records);
    let plan = build_replay_pairs(selected, &index);
    info!(
        "Retrying {} pair(s) ({} missing from input, {} repeated)",
        plan.pairs.len(),
        plan.missing,
        plan.repeated
    );
    if plan.pairs.is_empty() {
        return Ok(());
    }

    let _lock = RunLock::acquire(output)?;
    let cancel = CancelToken::default();
    install_interrupt_handler(Arc::clone(&cancel));

    let guard = DeduplicationGuard::preload(Box::new(JsonlMatchStore::new(vec![
        output.to_path_buf(),
    ])))?;
    let (results, errors) = open_sinks(output, scan.batch_size);
    let pool = start_pool(args.pool.inline, scan.workers, config, &cancel)?;

    // Every recovered comparison is written, whatever its score.
    let settings = ScanSettings {
        mode: ScanMode::All,
        similarity_threshold: 0.0,
        resume: false,
    };
    let mut scheduler = ComparisonScheduler::new(
        pool,
        guard,
        results,
        errors,
        Classifier::new(config.classification),
        settings,
    )
    .with_cancel(cancel)
    .with_progress(progress);

    let report = scheduler.run_batches(plan.pairs, scan.batch_size)?;
    let stats = report.stats;
    println!();
    println!("Retry summary");
    println!("  Recovered:  {}", stats.comparisons);
    println!("  Skipped:    {}", stats.skipped);
    println!("  Failed:     {}", stats.errors);
    println!("  Output:     {}", output.display());

    report.into_result().map(|_| ())
}

fn run_worker(args: &WorkerArgs) -> Result<()> {
    // The parent decides when workers stop by closing stdin.
    if let Err(e) = ctrlc::set_handler(|| {}) {
        debug!("Failed to install worker Ctrl+C handler: {e}");
    }

    validate_comparator(&ComparatorConfig {
        max_offset: args.max_offset,
    })?;
    let mut comparator = RawFingerprintComparator::new(args.max_offset);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let served = compare::serve(&mut comparator, stdin.lock(), stdout.lock())?;
    debug!("Worker exiting after {served} request(s)");
    Ok(())
}

fn handle_config_command(action: cli::ConfigAction, explicit: Option<&Path>) -> Result<()> {
    use cli::ConfigAction;

    match action {
        ConfigAction::Init => {
            let path = resolve_config_path(explicit)?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                let config = Config::default();
                let saved_path = match explicit {
                    Some(path) => {
                        config::save_config(&config, path)?;
                        path.to_path_buf()
                    }
                    None => save_default_config(&config)?,
                };
                println!("Created configuration file: {}", saved_path.display());
                println!("\nNext steps:");
                println!("  dupescan scan <fingerprints.jsonl> --mode cross-source");
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(explicit)?;
            println!("{config:#?}");
            Ok(())
        }
        ConfigAction::Path => {
            let path = resolve_config_path(explicit)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    explicit.map_or_else(config_file_path, |path| Ok(path.to_path_buf()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn scan_args(argv: &[&str]) -> ScanArgs {
        let mut full = vec!["dupescan", "scan", "feed.jsonl"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Scan(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = Config::default();
        let args = scan_args(&["--mode", "same-source", "-t", "0.9", "-w", "3", "--no-resume"]);

        let scan = merge_scan_config(&args, &config);

        assert_eq!(scan.mode, ScanMode::SameSource);
        assert_eq!(scan.similarity_threshold, 0.9);
        assert_eq!(scan.workers, 3);
        assert!(!scan.resume);
        assert_eq!(scan.duration_tolerance, config.scan.duration_tolerance);
    }

    #[test]
    fn test_config_used_when_no_flags() {
        let mut config = Config::default();
        config.scan.batch_size = 42;
        config.scan.mode = ScanMode::All;

        let scan = merge_scan_config(&scan_args(&[]), &config);

        assert_eq!(scan.batch_size, 42);
        assert_eq!(scan.mode, ScanMode::All);
        assert!(scan.resume);
    }
}
