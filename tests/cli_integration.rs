//! Integration tests for the dupescan binary.

#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

const ZEROS: &str = "0,0,0,0,0,0,0,0";
const ONES: &str = "4294967295,4294967295,4294967295,4294967295,4294967295,4294967295,4294967295,4294967295";

fn line(entity: &str, duration: f64, source: &str, fingerprint: &str) -> String {
    format!(
        r#"{{"entity_id":"{entity}","variant_key":"{entity}.flac","duration":{duration},"fingerprint":"{fingerprint}","source":"{source}","format":"flac"}}"#
    )
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, lines: &[String]) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    /// Feed with one cross-source duplicate (a/b), one distinct file (c)
    /// and one record whose fingerprint cannot be decoded (d).
    fn feed(&self) -> PathBuf {
        self.write(
            "feed.jsonl",
            &[
                line("a", 120.0, "label", ZEROS),
                line("b", 120.4, "archive", ZEROS),
                line("c", 121.0, "archive", ONES),
                line("d", 121.5, "label", "not,a,fingerprint"),
                line("e", 300.0, "label", ZEROS),
            ],
        )
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(cargo_bin("dupescan"));
        cmd.current_dir(self.dir.path())
            .arg("--config")
            .arg(self.path("config.toml"))
            .arg("--no-progress");
        for var in [
            "DUPESCAN_CONFIG",
            "DUPESCAN_MODE",
            "DUPESCAN_THRESHOLD",
            "DUPESCAN_TOLERANCE",
            "DUPESCAN_WORKERS",
            "DUPESCAN_BATCH_SIZE",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }
}

fn count_lines(path: &Path) -> usize {
    fs::read_to_string(path)
        .map(|s| s.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0)
}

#[test]
fn test_scan_with_worker_processes() {
    let ws = Workspace::new();
    let feed = ws.feed();
    let output = ws.path("matches.jsonl");

    ws.cmd()
        .arg("scan")
        .arg(&feed)
        .args(["-w", "2", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Scan summary (cross-source)"))
        .stdout(predicate::str::contains("Efficiency gain"));

    let matches = fs::read_to_string(&output).unwrap();
    assert_eq!(count_lines(&output), 1);
    assert!(matches.contains(r#""assetID1":"a""#));
    assert!(matches.contains(r#""duplicateType":"CROSS_SOURCE_IDENTICAL""#));

    // d fails against both archive records.
    assert_eq!(count_lines(&ws.path("matches_errors.jsonl")), 2);
    assert!(!ws.path("matches.jsonl.checkpoint.json").exists());
    assert!(!ws.path("matches.jsonl.dupescan.lock").exists());
}

#[test]
fn test_second_scan_adds_nothing() {
    let ws = Workspace::new();
    let feed = ws.feed();
    let output = ws.path("matches.jsonl");

    for _ in 0..2 {
        ws.cmd()
            .arg("scan")
            .arg(&feed)
            .arg("--inline")
            .arg("-o")
            .arg(&output)
            .assert()
            .success();
    }

    assert_eq!(count_lines(&output), 1);
}

#[test]
fn test_scan_default_output_in_working_directory() {
    let ws = Workspace::new();
    let feed = ws.feed();

    ws.cmd()
        .arg("scan")
        .arg(&feed)
        .args(["--inline", "--mode", "all"])
        .assert()
        .success();

    assert!(ws.path("duplicate_results_all.jsonl").exists());
}

#[test]
fn test_invalid_config_fails() {
    let ws = Workspace::new();
    let feed = ws.feed();
    fs::write(
        ws.path("config.toml"),
        "[scan]\nsimilarity_threshold = 2.0\n",
    )
    .unwrap();

    ws.cmd()
        .arg("scan")
        .arg(&feed)
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration validation failed"));
}

#[test]
fn test_missing_config_file_fails() {
    let ws = Workspace::new();
    let feed = ws.feed();

    Command::new(cargo_bin("dupescan"))
        .current_dir(ws.dir.path())
        .arg("--config")
        .arg(ws.path("nope.toml"))
        .arg("scan")
        .arg(&feed)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn test_locked_output_is_refused_unless_forced() {
    let ws = Workspace::new();
    let feed = ws.feed();
    let output = ws.path("matches.jsonl");
    fs::write(ws.path("matches.jsonl.dupescan.lock"), "{}").unwrap();

    ws.cmd()
        .arg("scan")
        .arg(&feed)
        .arg("--inline")
        .arg("-o")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked"));

    ws.cmd()
        .arg("scan")
        .arg(&feed)
        .args(["--inline", "--force-unlock", "-o"])
        .arg(&output)
        .assert()
        .success();
    assert_eq!(count_lines(&output), 1);
}

#[test]
fn test_too_few_records_fails() {
    let ws = Workspace::new();
    let feed = ws.write("feed.jsonl", &[line("a", 10.0, "s", ZEROS)]);

    ws.cmd()
        .arg("scan")
        .arg(&feed)
        .arg("--inline")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least two"));
}

#[test]
fn test_stats_and_export() {
    let ws = Workspace::new();
    let feed = ws.feed();
    let output = ws.path("matches.jsonl");
    ws.cmd()
        .arg("scan")
        .arg(&feed)
        .args(["--inline", "-o"])
        .arg(&output)
        .assert()
        .success();

    ws.cmd()
        .arg("stats")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total pairs:       1"))
        .stdout(predicate::str::contains("CROSS_SOURCE_IDENTICAL"));

    ws.cmd()
        .arg("export")
        .arg(&output)
        .arg("--bom")
        .assert()
        .success();

    let csv = fs::read(ws.path("matches.csv")).unwrap();
    assert!(csv.starts_with(b"\xEF\xBB\xBF"));
    let text = String::from_utf8_lossy(&csv);
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("similarity"));
}

#[test]
fn test_retry_recovers_failed_pairs() {
    let ws = Workspace::new();
    let feed = ws.feed();
    let output = ws.path("matches.jsonl");
    ws.cmd()
        .arg("scan")
        .arg(&feed)
        .args(["--inline", "-o"])
        .arg(&output)
        .assert()
        .success();
    let errors = ws.path("matches_errors.jsonl");

    ws.cmd()
        .arg("retry")
        .arg(&errors)
        .arg("--analyze-only")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total errors: 2"))
        .stdout(predicate::str::contains("COMPARISON_FAILED: 2 (100.0%)"));

    // d was fingerprinted again.
    let fixed = ws.write(
        "fixed.jsonl",
        &[
            line("b", 120.4, "archive", ZEROS),
            line("c", 121.0, "archive", ONES),
            line("d", 121.5, "label", ZEROS),
        ],
    );
    let recovered = ws.path("retry.jsonl");

    ws.cmd()
        .arg("retry")
        .arg(&errors)
        .args(["--inline", "-i"])
        .arg(&fixed)
        .arg("-o")
        .arg(&recovered)
        .assert()
        .success()
        .stdout(predicate::str::contains("Recovered:  2"));

    // Every recovered comparison is written, whatever its score.
    assert_eq!(count_lines(&recovered), 2);
    assert_eq!(count_lines(&ws.path("retry_errors.jsonl")), 0);
}

#[test]
fn test_retry_requires_input_and_output() {
    let ws = Workspace::new();
    let errors = ws.write("errors.jsonl", &[]);

    ws.cmd().arg("retry").arg(&errors).assert().failure();
}

#[test]
fn test_worker_answers_requests() {
    let request_a = line("a", 10.0, "s1", ZEROS);
    let request_b = line("b", 10.0, "s2", ZEROS);
    let request = format!(r#"{{"id":41,"a":{request_a},"b":{request_b}}}"#);

    let mut child = Command::new(cargo_bin("dupescan"))
        .arg("worker")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, "{request}").unwrap();
        writeln!(stdin, "not json").unwrap();
    }
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let replies: Vec<&str> = stdout.lines().collect();
    assert_eq!(replies.len(), 2);
    assert!(replies[0].contains(r#""status":"ok""#));
    assert!(replies[0].contains(r#""id":41"#));
    assert!(replies[1].contains(r#""status":"rejected""#));
}

#[test]
fn test_config_path_prints_explicit_file() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}
