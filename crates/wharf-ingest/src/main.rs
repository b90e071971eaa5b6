//! Wharf Ingest - landing-to-warehouse ingestion tool

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use wharf_common::logging::{init_logging, LogConfig, LogLevel};
use wharf_ingest::config::DatabaseConfig;
use wharf_ingest::pipeline::IngestPipeline;
use wharf_ingest::registry::Registry;
use wharf_ingest::storage::{Storage, StorageConfig};

#[derive(Parser, Debug)]
#[command(name = "wharf-ingest")]
#[command(author, version, about = "Idempotent landing-to-warehouse ingestion")]
struct Cli {
    /// Landing surface to ingest
    #[command(subcommand)]
    surface: Surface,

    /// Registry definition file
    #[arg(short, long, default_value = "registry.json")]
    registry: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Surface {
    /// Ingest CSV exports from a local landing directory
    Local {
        /// Landing directory to scan
        #[arg(short, long, default_value = "./raw_data/affiliate")]
        dir: PathBuf,

        /// Source name the directory belongs to
        #[arg(short, long, default_value = "affiliate")]
        source: String,
    },

    /// Ingest landed exports from an object-store prefix
    ObjectStore {
        /// Key prefix to list
        #[arg(short, long, default_value = "raw")]
        prefix: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("wharf-ingest".to_string())
        .build();

    // Environment variables take precedence; unset ones leave the
    // flag-derived settings alone
    let log_config = log_config.with_env_overrides()?;

    init_logging(&log_config)?;

    // Registry load failures are the one fatal error: without routing
    // data there is nothing safe to ingest.
    let registry = Registry::load(&cli.registry)?;

    let pool = DatabaseConfig::from_env().connect().await?;
    let pipeline = IngestPipeline::new(pool, registry);

    let stats = match cli.surface {
        Surface::Local { dir, source } => {
            info!(dir = %dir.display(), %source, "ingesting local landing directory");
            pipeline.run_local(&dir, &source).await?
        },
        Surface::ObjectStore { prefix } => {
            info!(%prefix, "ingesting object-store prefix");
            let storage = Storage::new(StorageConfig::from_env()?).await?;
            pipeline.run_object_store(&storage, &prefix).await?
        },
    };

    // Artifact-level failures are diagnostic only; the run still exits 0.
    info!(
        run_id = %stats.run_id,
        discovered = stats.discovered,
        committed = stats.committed,
        skipped = stats.skipped_already_loaded,
        failed = stats.failed,
        rows = stats.rows_loaded,
        "ingestion complete"
    );

    Ok(())
}
