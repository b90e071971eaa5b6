//! Wharf Ingest Library
//!
//! Idempotent landing-to-warehouse ingestion for periodic exports dropped
//! by external producers (an affiliate commerce program and a video
//! analytics API).
//!
//! The engine makes one pass over a landing surface (a local directory or
//! an object-store prefix), derives artifact identity and routing purely
//! from naming convention, asks the warehouse which artifacts it has
//! already absorbed, and applies each remaining artifact inside its own
//! transaction. Re-running the pass against unchanged surfaces loads
//! nothing; a failing artifact never blocks the rest of the run.
//!
//! # Example
//!
//! ```no_run
//! use wharf_ingest::{config::DatabaseConfig, pipeline::IngestPipeline, registry::Registry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Registry::load("registry.json".as_ref())?;
//!     let pool = DatabaseConfig::from_env().connect().await?;
//!     let pipeline = IngestPipeline::new(pool, registry);
//!     let stats = pipeline.run_local("./raw_data/affiliate".as_ref(), "affiliate").await?;
//!     tracing::info!(committed = stats.committed, "run finished");
//!     Ok(())
//! }
//! ```

pub mod applier;
pub mod config;
pub mod error;
pub mod load_state;
pub mod locator;
pub mod pipeline;
pub mod registry;
pub mod retry;
pub mod storage;
