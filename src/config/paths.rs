//! Platform configuration paths and run artifact paths.

use crate::config::ScanMode;
use crate::constants::{
    APP_NAME, CHECKPOINT_EXTENSION, DEFAULT_OUTPUT_STEM, ERROR_FILE_SUFFIX, LOCK_FILE_EXTENSION,
};
use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Get the configuration directory for the current platform.
///
/// - Linux: `~/.config/dupescan/`
/// - macOS: `~/Library/Application Support/dupescan/`
/// - Windows: `%APPDATA%\dupescan\`
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(Error::ConfigDirNotFound)
}

/// Get the full path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default match output path for a mode, relative to the working directory.
///
/// Stable across runs so that a resumed run finds its checkpoint.
pub fn default_output_path(mode: ScanMode) -> PathBuf {
    PathBuf::from(format!("{DEFAULT_OUTPUT_STEM}_{mode}.jsonl"))
}

/// Error output path paired with a match output path.
///
/// `results.jsonl` becomes `results_errors.jsonl`; other names get the
/// suffix appended before a `.jsonl` extension.
pub fn error_path_for(output: &Path) -> PathBuf {
    let stem = output.file_stem().map_or_else(
        || std::borrow::Cow::Borrowed(DEFAULT_OUTPUT_STEM),
        |s| s.to_string_lossy(),
    );
    let name = format!("{stem}{ERROR_FILE_SUFFIX}.jsonl");
    output.with_file_name(name)
}

/// Checkpoint path for a match output path.
pub fn checkpoint_path_for(output: &Path) -> PathBuf {
    append_to_file_name(output, CHECKPOINT_EXTENSION)
}

/// Run lock path for a match output path.
pub fn lock_path_for(output: &Path) -> PathBuf {
    append_to_file_name(output, LOCK_FILE_EXTENSION)
}

fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let name = path.file_name().map_or_else(
        || std::borrow::Cow::Borrowed("output"),
        |n| n.to_string_lossy(),
    );
    path.with_file_name(format!("{name}{suffix}"))
}
