//! Error types shared across Wharf crates

use thiserror::Error;

/// Result type alias for Wharf operations
pub type Result<T> = std::result::Result<T, WharfError>;

/// Main error type for Wharf
#[derive(Error, Debug)]
pub enum WharfError {
    #[error("Configuration error: {0}")]
    Config(String),
}
