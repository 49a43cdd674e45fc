//! Scanner error types.

use std::path::PathBuf;

use thiserror::Error;
use trawl_core::{DerivationError, QueryError};

/// Errors that stop a scan from starting or surface from its parts.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The scan log could not be created or written.
    #[error("scan log {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration failed to load or validate.
    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Derivation(#[from] DerivationError),
}

impl From<::config::ConfigError> for ScanError {
    fn from(e: ::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
