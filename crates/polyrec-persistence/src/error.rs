//! Persistence error types.

use polyrec_core::SinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl From<PersistenceError> for SinkError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::Io(io) => SinkError::Io(io),
            other => SinkError::Encode(other.to_string()),
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
