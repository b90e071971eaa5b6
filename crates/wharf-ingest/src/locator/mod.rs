//! Artifact Locator
//!
//! Enumerates candidate artifacts on a landing surface and derives their
//! identity and routing metadata purely from naming convention:
//!
//! - **local**: flat landing directories of producer CSV exports
//! - **object_store**: partitioned object keys under a bucket prefix
//!
//! Discovery is a read-only scan. Per-entry validation failures are never
//! fatal; each bad entry is reported with a reason and the scan continues.

pub mod local;
pub mod object_store;

pub use local::discover_local;
pub use object_store::discover_objects;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Where an artifact's bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// A file in a local landing directory
    Local(PathBuf),
    /// An object key under the configured bucket
    Object(String),
}

/// Identity and routing metadata for one discovered artifact
///
/// `artifact_id` is derived deterministically from the entry's name or key
/// and doubles as the load-ledger value stamped into the warehouse.
#[derive(Debug, Clone)]
pub struct ArtifactDescriptor {
    pub artifact_id: String,
    pub source: String,
    pub report_name: String,
    pub target_schema: String,
    pub target_table: String,
    /// Producer-declared refresh date (local) or run timestamp (object store)
    pub refresh_ts: DateTime<Utc>,
    pub location: ArtifactLocation,
}

impl ArtifactDescriptor {
    /// Schema-qualified table name, for logging and snapshot keys
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.target_schema, self.target_table)
    }
}
