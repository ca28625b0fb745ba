//! Configuration validation.
//!
//! Everything here runs before any record is loaded; a failure is fatal.

use crate::config::{ClassificationConfig, ComparatorConfig, Config, ScanConfig};
use crate::constants::{comparator, similarity};
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_scan(&config.scan)?;
    validate_classification(&config.classification)?;
    validate_comparator(&config.comparator)?;
    Ok(())
}

/// Validate scan settings.
pub fn validate_scan(scan: &ScanConfig) -> Result<()> {
    validate_unit_interval("similarity_threshold", scan.similarity_threshold)?;

    if !scan.duration_tolerance.is_finite() || scan.duration_tolerance <= 0.0 {
        return Err(Error::ConfigValidation {
            message: format!(
                "duration_tolerance must be a positive number of seconds, got {}",
                scan.duration_tolerance
            ),
        });
    }

    if scan.batch_size == 0 {
        return Err(Error::ConfigValidation {
            message: "batch_size must be at least 1".to_string(),
        });
    }

    Ok(())
}

/// Validate classification thresholds: each in `[0, 1]`, and ordered.
pub fn validate_classification(c: &ClassificationConfig) -> Result<()> {
    validate_unit_interval("classification.identical", c.identical)?;
    validate_unit_interval("classification.high_similarity", c.high_similarity)?;
    validate_unit_interval("classification.related", c.related)?;

    if !(c.related <= c.high_similarity && c.high_similarity <= c.identical) {
        return Err(Error::ConfigValidation {
            message: format!(
                "classification thresholds must satisfy related <= high_similarity <= identical, got {} / {} / {}",
                c.related, c.high_similarity, c.identical
            ),
        });
    }

    Ok(())
}

/// Validate built-in comparator settings.
pub fn validate_comparator(c: &ComparatorConfig) -> Result<()> {
    if c.max_offset > comparator::MAX_OFFSET_LIMIT {
        return Err(Error::ConfigValidation {
            message: format!(
                "comparator.max_offset must be at most {} frames, got {}",
                comparator::MAX_OFFSET_LIMIT,
                c.max_offset
            ),
        });
    }
    Ok(())
}

fn validate_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(similarity::MIN..=similarity::MAX).contains(&value) {
        return Err(Error::ConfigValidation {
            message: format!(
                "{name} must be between {} and {}, got {value}",
                similarity::MIN,
                similarity::MAX
            ),
        });
    }
    Ok(())
}
