//! Content blocking errors
//!
//! None of these ever reach a `should_block` caller. They surface only
//! from loading and configuration, where the engines log them and fall
//! back to the next rule source.

use std::path::PathBuf;
use thiserror::Error;

/// Errors during rule loading and configuration
#[derive(Debug, Error)]
pub enum AdblockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Failed to read {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
