//! Transactional Applier
//!
//! Applies one artifact at a time to its target table, each inside its own
//! transaction: validate the header against the registry, stream rows with
//! batch metadata appended into a `COPY ... FROM STDIN` channel, commit.
//! Any failure rolls back that artifact only; the run continues.
//!
//! Per artifact the applier walks
//! `PENDING -> VALIDATING -> LOADING -> COMMITTED`, short-circuiting to
//! `SKIPPED` when the load-state snapshot already holds the artifact id,
//! or to `FAILED` on the first error.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgCopyIn, PgPool};
use tracing::{debug, info, warn};

use crate::error::ApplyError;
use crate::load_state::{quote_ident, LoadStateResolver, ARTIFACT_ID_COLUMN};
use crate::locator::{ArtifactDescriptor, ArtifactLocation};
use crate::registry::Registry;
use crate::storage::Storage;

/// Columns stamped onto every row at load time, in append order
pub const METADATA_COLUMNS: [&str; 3] = ["wh_loaded_at", ARTIFACT_ID_COLUMN, "source_refresh_ts"];

/// Flush threshold for the COPY send buffer
const COPY_BUFFER_BYTES: usize = 64 * 1024;

/// Terminal state of one artifact application
#[derive(Debug)]
pub enum ApplyOutcome {
    /// All rows landed and the transaction committed
    Committed { rows: u64 },
    /// The artifact id was already present in the load-state snapshot
    Skipped,
    /// Validation or streaming failed; the transaction was rolled back
    Failed(ApplyError),
}

pub struct TransactionalApplier {
    pool: PgPool,
    storage: Option<Storage>,
    /// Load timestamp, constant for the whole run
    loaded_at: DateTime<Utc>,
}

impl TransactionalApplier {
    pub fn new(pool: PgPool, storage: Option<Storage>) -> Self {
        Self {
            pool,
            storage,
            loaded_at: Utc::now(),
        }
    }

    /// Apply one artifact against the current load-state snapshot.
    ///
    /// Returns `Err` only for infrastructure faults outside any artifact's
    /// boundary; every per-artifact failure is folded into
    /// [`ApplyOutcome::Failed`] so the caller can keep going.
    pub async fn apply(
        &self,
        descriptor: &ArtifactDescriptor,
        registry: &Registry,
        load_state: &mut LoadStateResolver,
    ) -> Result<ApplyOutcome> {
        let table = descriptor.qualified_table();

        let loaded = load_state
            .already_loaded(&descriptor.target_schema, &descriptor.target_table)
            .await?;
        if loaded.contains(&descriptor.artifact_id) {
            info!(
                artifact = %descriptor.artifact_id,
                table = %table,
                "artifact already ingested, skipping"
            );
            return Ok(ApplyOutcome::Skipped);
        }

        match self.load_artifact(descriptor, registry).await {
            Ok(rows) => {
                load_state.mark_loaded(
                    &descriptor.target_schema,
                    &descriptor.target_table,
                    &descriptor.artifact_id,
                );
                info!(
                    artifact = %descriptor.artifact_id,
                    table = %table,
                    rows,
                    "artifact committed"
                );
                Ok(ApplyOutcome::Committed { rows })
            },
            Err(error) => {
                warn!(
                    artifact = %descriptor.artifact_id,
                    table = %table,
                    %error,
                    "artifact failed, rolled back, continuing with next"
                );
                Ok(ApplyOutcome::Failed(error))
            },
        }
    }

    /// Validate and stream one artifact inside its own transaction.
    async fn load_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
        registry: &Registry,
    ) -> Result<u64, ApplyError> {
        let artifact = descriptor.artifact_id.as_str();

        let resolved = registry
            .resolve(&descriptor.source, &descriptor.report_name)
            .map_err(|e| ApplyError::load_io(artifact, e))?;

        let bytes = self.fetch(descriptor).await?;

        debug!(artifact = %artifact, "validating artifact header");
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let header: Vec<String> = reader
            .headers()
            .map_err(|e| ApplyError::load_io(artifact, e))?
            .iter()
            .map(str::to_string)
            .collect();

        if let Some(column) = unexpected_column(&header, resolved.expected_columns) {
            return Err(ApplyError::SchemaViolation {
                artifact: artifact.to_string(),
                column,
            });
        }

        debug!(artifact = %artifact, "loading artifact rows");
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ApplyError::load_io(artifact, e))?;

        let statement = copy_statement(&descriptor.target_schema, &descriptor.target_table, &header);
        let mut copy = tx
            .copy_in_raw(&statement)
            .await
            .map_err(|e| ApplyError::load_io(artifact, e))?;

        match self.stream_records(&mut copy, &mut reader, descriptor).await {
            Ok(()) => {
                let rows = copy
                    .finish()
                    .await
                    .map_err(|e| ApplyError::load_io(artifact, e))?;
                tx.commit()
                    .await
                    .map_err(|e| ApplyError::load_io(artifact, e))?;
                Ok(rows)
            },
            Err(error) => {
                // Abort the COPY channel, then let the dropped transaction
                // roll back; no partial rows survive.
                let _ = copy.abort("artifact load failed").await;
                Err(error)
            },
        }
    }

    /// Stream every record through the COPY channel with metadata appended.
    async fn stream_records(
        &self,
        copy: &mut PgCopyIn<&mut PgConnection>,
        reader: &mut csv::Reader<&[u8]>,
        descriptor: &ArtifactDescriptor,
    ) -> Result<(), ApplyError> {
        let artifact = descriptor.artifact_id.as_str();
        let loaded_at = self.loaded_at.to_rfc3339();
        let refresh_ts = descriptor.refresh_ts.to_rfc3339();

        let mut buf: Vec<u8> = Vec::with_capacity(COPY_BUFFER_BYTES);
        for record in reader.records() {
            let record = record.map_err(|e| ApplyError::load_io(artifact, e))?;
            let row = enrich_row(&record, &loaded_at, artifact, &refresh_ts);
            write_csv_row(&mut buf, &row).map_err(|e| ApplyError::load_io(artifact, e))?;

            if buf.len() >= COPY_BUFFER_BYTES {
                copy.send(buf.as_slice())
                    .await
                    .map_err(|e| ApplyError::load_io(artifact, e))?;
                buf.clear();
            }
        }

        if !buf.is_empty() {
            copy.send(buf.as_slice())
                .await
                .map_err(|e| ApplyError::load_io(artifact, e))?;
        }

        Ok(())
    }

    /// Retrieve the artifact's bytes from its landing surface.
    async fn fetch(&self, descriptor: &ArtifactDescriptor) -> Result<Vec<u8>, ApplyError> {
        let artifact = descriptor.artifact_id.as_str();
        match &descriptor.location {
            ArtifactLocation::Local(path) => tokio::fs::read(path)
                .await
                .map_err(|e| ApplyError::load_io(artifact, e)),
            ArtifactLocation::Object(key) => {
                let storage = self.storage.as_ref().ok_or_else(|| {
                    ApplyError::load_io(artifact, "no object store configured for this run")
                })?;
                storage
                    .download(key)
                    .await
                    .map_err(|e| ApplyError::load_io(artifact, e))
            },
        }
    }
}

/// First header column that is neither expected nor injected metadata.
fn unexpected_column(header: &[String], expected: &[String]) -> Option<String> {
    header
        .iter()
        .find(|column| {
            let column = column.as_str();
            !expected.iter().any(|e| e.as_str() == column)
                && !METADATA_COLUMNS.contains(&column)
        })
        .cloned()
}

/// Build the COPY statement with an explicit column list: the validated
/// header in artifact order, then the metadata columns. Never relies on
/// table-default column ordering.
fn copy_statement(schema: &str, table: &str, header: &[String]) -> String {
    let columns: Vec<String> = header
        .iter()
        .map(|column| quote_ident(column))
        .chain(METADATA_COLUMNS.iter().map(|column| quote_ident(column)))
        .collect();

    format!(
        "COPY {}.{} ({}) FROM STDIN WITH (FORMAT csv)",
        quote_ident(schema),
        quote_ident(table),
        columns.join(", "),
    )
}

/// Source fields plus fixed-order batch metadata values.
fn enrich_row(
    record: &csv::StringRecord,
    loaded_at: &str,
    artifact_id: &str,
    refresh_ts: &str,
) -> Vec<String> {
    let mut row: Vec<String> = record.iter().map(str::to_string).collect();
    row.push(loaded_at.to_string());
    row.push(artifact_id.to_string());
    row.push(refresh_ts.to_string());
    row
}

fn write_csv_row(buf: &mut Vec<u8>, row: &[String]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(buf);
    writer.write_record(row)?;
    writer.flush()?;
    Ok(())
}
