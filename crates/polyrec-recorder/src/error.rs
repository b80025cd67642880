//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] polyrec_ws::WsError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] polyrec_discovery::DiscoveryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] polyrec_persistence::PersistenceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] polyrec_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
