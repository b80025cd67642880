//! Process-wide counters and structured logging for polyrec.
//!
//! `RecorderStats` is the read model polled by external presentation layers.
//! The core only ever writes it; nothing in the pipeline reads counters back
//! for control decisions.

pub mod error;
pub mod logging;
pub mod stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use stats::{RecorderStats, StatsSnapshot};
