use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures the classifier reports to the operator.
///
/// Data-quality problems never show up here: they become discrepancy records
/// or are skipped. Only misconfiguration of the reference data does.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyError {
    /// The reference bundle has no equivalence map, nothing can be compared
    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(String),

    /// An equivalence group mixes incomparable value kinds
    #[error("equivalence group '{group}' expects {expected} but document '{document_id}' field '{field}' holds {found}")]
    TypeMismatch {
        group: String,
        expected: String,
        found: String,
        document_id: String,
        field: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("could not read config file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Other(String),
}
