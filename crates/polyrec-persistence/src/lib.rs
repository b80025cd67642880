//! Parquet persistence for recorded market data.
//!
//! Writes hour-partitioned Parquet files for post-analysis in Python/Polars.

pub mod error;
pub mod sink;

pub use error::{PersistenceError, PersistenceResult};
pub use sink::ParquetSink;
