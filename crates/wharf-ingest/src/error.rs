//! Error taxonomy for the ingestion engine
//!
//! Three scopes, three fates:
//!
//! - [`DiscoveryError`] is per landing entry. The locator reports it and
//!   keeps scanning; a malformed name never aborts discovery.
//! - [`ApplyError`] is per artifact. The applier rolls back that artifact's
//!   transaction and moves on to the next one.
//! - [`RegistryError::Read`] / [`RegistryError::Parse`] are fatal: without a
//!   registry there is no routing, so the run aborts before discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Per-entry discovery failures (non-fatal, skip-with-reason)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("{name}: not a .csv file")]
    NotCsv { name: String },

    #[error("{name}: expected 6 hyphen-delimited fields, found {found} (format is YYYY-prefix-suffix-YYYY-MM-DD.csv)")]
    FieldCount { name: String, found: usize },

    #[error("{name}: date fields are not numeric (format is YYYY-prefix-suffix-YYYY-MM-DD.csv)")]
    NonNumericDate { name: String },

    #[error("{name}: refresh date is not a valid calendar date")]
    InvalidDate { name: String },

    #[error("{name}: report {report} is not in the registry")]
    UnknownReport { name: String, report: String },

    #[error("{key}: missing or malformed {segment} segment")]
    MalformedKey { key: String, segment: &'static str },
}

/// Report definition (registry) failures
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Fatal: the definition source could not be read
    #[error("failed to read registry definition {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fatal: the definition source could not be parsed
    #[error("failed to parse registry definition {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Per-artifact: the (source, report) pair is not registered
    #[error("unknown report {report} for source {source_name}")]
    UnknownReport { source_name: String, report: String },
}

/// Per-artifact application failures (non-fatal to the run)
#[derive(Error, Debug)]
pub enum ApplyError {
    /// The artifact header declared a column that is neither in the report
    /// definition nor an injected metadata column. Nothing was committed.
    #[error("artifact {artifact}: unexpected column {column} not in report schema")]
    SchemaViolation { artifact: String, column: String },

    /// Anything that went wrong while fetching, streaming, or committing.
    /// The artifact's transaction was rolled back.
    #[error("artifact {artifact}: load failed: {reason}")]
    LoadIo { artifact: String, reason: String },
}

impl ApplyError {
    /// Wrap a stream/commit failure with the artifact identity.
    pub fn load_io(artifact: &str, err: impl std::fmt::Display) -> Self {
        ApplyError::LoadIo {
            artifact: artifact.to_string(),
            reason: err.to_string(),
        }
    }
}
