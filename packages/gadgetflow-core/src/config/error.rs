//! Configuration errors

use std::ops::RangeInclusive;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is outside {}..={}: {hint}", range.start(), range.end())]
    Range {
        field: &'static str,
        value: u64,
        range: RangeInclusive<u64>,
        hint: &'static str,
    },

    #[error("Configuration file has no 'version' field (expected 'version: 1')")]
    MissingVersion,

    #[error("Configuration version {found} is not supported (supported: {supported:?})")]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    #[error("Unknown preset '{0}' (expected fast, balanced, thorough or custom)")]
    UnknownPreset(String),

    /// An external-method pattern failed to compile
    #[error("Invalid external method pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fail with [`ConfigError::Range`] unless `value` lies in `range`
pub(crate) fn check_range(
    field: &'static str,
    value: u64,
    range: RangeInclusive<u64>,
    hint: &'static str,
) -> ConfigResult<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Range {
            field,
            value,
            range,
            hint,
        })
    }
}
