//! Configuration loading and management.

mod file;
mod paths;
mod types;
mod validate;

pub use file::{load_config, load_config_file, save_config, save_default_config};
pub use paths::{
    checkpoint_path_for, config_dir, config_file_path, default_output_path, error_path_for,
    lock_path_for,
};
pub use types::{ClassificationConfig, ComparatorConfig, Config, ScanConfig, ScanMode};
pub use validate::{validate_classification, validate_comparator, validate_config, validate_scan};
