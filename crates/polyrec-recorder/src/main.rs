//! Polymarket market data recorder - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Live market data recorder for Polymarket CLOB markets
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via POLYREC_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    polyrec_ws::init_crypto();

    let args = Args::parse();

    polyrec_telemetry::init_logging()?;

    info!("Starting polyrec v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > POLYREC_CONFIG env var > default
    let config = match args.config {
        Some(path) => {
            info!(config_path = %path, "Loading configuration");
            polyrec_recorder::AppConfig::from_file(&path)?
        }
        None => polyrec_recorder::AppConfig::load()?,
    };
    info!(
        ws_url = %config.ws.url,
        data_dir = %config.recording.data_dir,
        ?config.discovery.mode,
        "Configuration loaded"
    );

    let app = polyrec_recorder::Application::new(config)?;
    app.run().await?;

    Ok(())
}
