//! Ingestion pipeline
//!
//! One run is a single synchronous pass: load-state snapshots for every
//! distinct target table first, then each discovered artifact applied in
//! discovery order, one at a time. Idempotency comes from re-running the
//! whole pass safely, not from any cross-run coordination.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::applier::{ApplyOutcome, TransactionalApplier};
use crate::load_state::LoadStateResolver;
use crate::locator::{discover_local, discover_objects, ArtifactDescriptor};
use crate::registry::Registry;
use crate::storage::Storage;

/// Outcome counts for one ingestion run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub run_id: Uuid,
    pub discovered: usize,
    pub committed: usize,
    pub skipped_already_loaded: usize,
    pub failed: usize,
    pub rows_loaded: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

pub struct IngestPipeline {
    pool: PgPool,
    registry: Registry,
}

impl IngestPipeline {
    pub fn new(pool: PgPool, registry: Registry) -> Self {
        Self { pool, registry }
    }

    /// Ingest a local landing directory for one source.
    pub async fn run_local(&self, dir: &Path, source: &str) -> Result<RunStats> {
        let descriptors = discover_local(dir, source, &self.registry)?;
        self.run(descriptors, None).await
    }

    /// Ingest everything under an object-store prefix.
    pub async fn run_object_store(&self, storage: &Storage, prefix: &str) -> Result<RunStats> {
        let descriptors = discover_objects(storage, prefix, &self.registry).await?;
        self.run(descriptors, Some(storage)).await
    }

    async fn run(
        &self,
        descriptors: Vec<ArtifactDescriptor>,
        storage: Option<&Storage>,
    ) -> Result<RunStats> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            %run_id,
            discovered = descriptors.len(),
            "starting ingestion run"
        );

        let mut load_state = LoadStateResolver::new(self.pool.clone());

        // Snapshot every distinct target table before any load begins.
        let mut tables: Vec<(String, String)> = Vec::new();
        for descriptor in &descriptors {
            let entry = (
                descriptor.target_schema.clone(),
                descriptor.target_table.clone(),
            );
            if !tables.contains(&entry) {
                tables.push(entry);
            }
        }
        for (schema, table) in &tables {
            load_state.already_loaded(schema, table).await?;
        }

        let applier = TransactionalApplier::new(self.pool.clone(), storage.cloned());

        let mut committed = 0usize;
        let mut skipped_already_loaded = 0usize;
        let mut failed = 0usize;
        let mut rows_loaded = 0u64;

        for descriptor in &descriptors {
            match applier.apply(descriptor, &self.registry, &mut load_state).await? {
                ApplyOutcome::Committed { rows } => {
                    committed += 1;
                    rows_loaded += rows;
                },
                ApplyOutcome::Skipped => skipped_already_loaded += 1,
                ApplyOutcome::Failed(_) => failed += 1,
            }
        }

        let stats = RunStats {
            run_id,
            discovered: descriptors.len(),
            committed,
            skipped_already_loaded,
            failed,
            rows_loaded,
            started_at,
            completed_at: Utc::now(),
        };

        info!(
            %run_id,
            discovered = stats.discovered,
            committed = stats.committed,
            skipped = stats.skipped_already_loaded,
            failed = stats.failed,
            rows = stats.rows_loaded,
            "ingestion run complete"
        );

        Ok(stats)
    }
}
