//! Recorder application library.
//!
//! Exposed as a library so integration tests can drive the application
//! without going through the binary.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, DiscoveryConfig, DiscoveryMode, RecordingConfig, WsConfig};
pub use error::{AppError, AppResult};
