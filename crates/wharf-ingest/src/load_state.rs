//! Load-State Resolver
//!
//! The warehouse itself is the load ledger: an artifact counts as applied
//! to a table when rows carrying its id exist in that table's
//! `source_artifact` column. The resolver snapshots that set once per
//! target table per run with a distinct-value query and caches it; the
//! applier consults and extends the cached snapshot, never the warehouse.
//!
//! The snapshot is authoritative for the run. It is not re-validated
//! against concurrent writers, which is why single-writer-per-table
//! discipline must be enforced by the caller's scheduler.

use std::collections::{hash_map::Entry, HashMap, HashSet};

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

/// Name of the metadata column that records artifact identity
pub const ARTIFACT_ID_COLUMN: &str = "source_artifact";

/// Quote an identifier for interpolation into dynamic SQL.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub struct LoadStateResolver {
    pool: PgPool,
    cache: HashMap<String, HashSet<String>>,
}

impl LoadStateResolver {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: HashMap::new(),
        }
    }

    /// The set of artifact ids already applied to `schema.table`.
    ///
    /// Issues one distinct-value query per distinct table per run; later
    /// calls for the same table are served from the cache.
    pub async fn already_loaded(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<&HashSet<String>> {
        let key = format!("{schema}.{table}");

        match self.cache.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let sql = format!(
                    "SELECT DISTINCT {} FROM {}.{}",
                    quote_ident(ARTIFACT_ID_COLUMN),
                    quote_ident(schema),
                    quote_ident(table),
                );

                let ids: Vec<String> = sqlx::query_scalar(&sql)
                    .fetch_all(&self.pool)
                    .await
                    .with_context(|| {
                        format!("failed to fetch already-loaded artifact set for {schema}.{table}")
                    })?;

                info!(
                    table = %entry.key(),
                    loaded = ids.len(),
                    "snapshotted already-loaded artifact set"
                );

                Ok(entry.insert(ids.into_iter().collect()))
            },
        }
    }

    /// Record a freshly committed artifact in the in-run snapshot so a
    /// duplicate later in the same run is skipped without touching the
    /// warehouse again.
    pub fn mark_loaded(&mut self, schema: &str, table: &str, artifact_id: &str) {
        self.cache
            .entry(format!("{schema}.{table}"))
            .or_default()
            .insert(artifact_id.to_string());
    }
}
