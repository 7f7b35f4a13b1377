//! Error types for the scraping core.
//!
//! Nothing here ever escapes a scan pass: strategies swallow these per
//! candidate. They surface only at construction-time boundaries
//! (`Measurement::new`, `CurveStore::upsert`, config loading).

use thiserror::Error;

/// Reasons a candidate measurement is refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    #[error("frequency/amplitude length mismatch: {frequencies} frequencies vs {amplitudes} amplitudes")]
    ShapeMismatch {
        frequencies: usize,
        amplitudes: usize,
    },

    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("non-positive frequency {value} at index {index}")]
    NonPositiveFrequency { index: usize, value: f64 },

    #[error("label {raw:?} normalizes to an empty name")]
    EmptyName { raw: String },
}

/// Failure while parsing a page-embedded literal.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("literal parse error at byte {offset}: {reason}")]
pub struct LiteralError {
    pub offset: usize,
    pub reason: String,
}

impl LiteralError {
    pub(crate) fn new(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset,
            reason: reason.into(),
        }
    }
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// The page watcher task is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WatcherError {
    #[error("page watcher has shut down")]
    Closed,
}
