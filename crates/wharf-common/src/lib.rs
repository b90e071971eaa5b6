//! Wharf Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Wharf workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all Wharf workspace
//! members:
//!
//! - **Error Handling**: the shared [`WharfError`] type and [`Result`] alias
//! - **Logging**: tracing-based logging configuration and initialization
//!
//! # Example
//!
//! ```no_run
//! use wharf_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("wharf starting");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, WharfError};
