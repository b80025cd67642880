//! Discovery error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Fetch command timed out after {timeout_secs}s")]
    CommandTimeout { timeout_secs: u64 },

    #[error("Fetch command exited with status {status}")]
    CommandFailed { status: i32 },

    #[error("Fetch command produced no output file at {0}")]
    MissingOutput(PathBuf),
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
