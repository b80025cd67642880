//! Main application orchestration.
//!
//! Wires the pipeline together: discovery refresh loop and subscription
//! session running concurrently, communicating only through the shared
//! routing table. The session is gated on the first successful discovery
//! cycle; on shutdown both loops stop and every buffer gets a final flush.

use crate::config::{AppConfig, DiscoveryMode};
use crate::error::{AppError, AppResult};
use polyrec_discovery::{CommandSource, HttpSource, InstrumentSource, RefreshLoop};
use polyrec_feed::Router;
use polyrec_persistence::ParquetSink;
use polyrec_telemetry::RecorderStats;
use polyrec_ws::MarketSession;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    stats: Arc<RecorderStats>,
    router: Arc<Router>,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let stats = Arc::new(RecorderStats::new());
        let sink = Arc::new(ParquetSink::new(&config.recording.data_dir));
        let router = Arc::new(Router::new(
            stats.clone(),
            sink,
            config.flush_interval(),
        ));

        Ok(Self {
            config,
            stats,
            router,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn stats(&self) -> Arc<RecorderStats> {
        self.stats.clone()
    }

    /// Run until a shutdown signal.
    pub async fn run(&self) -> AppResult<()> {
        let source = self.build_source()?;
        let refresh = RefreshLoop::new(
            source,
            self.router.clone(),
            self.stats.clone(),
            self.config.refresh_period(),
            self.shutdown.clone(),
        );
        let refresh_handle = tokio::spawn(refresh.run());

        // Startup gate: nothing to subscribe to before the first successful
        // discovery cycle.
        info!("Waiting for first discovery result");
        tokio::select! {
            () = self.router.wait_ready() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received before first discovery result");
                self.shutdown.cancel();
                let _ = refresh_handle.await;
                return Ok(());
            }
        }
        info!(
            instruments = self.router.routing().current().instrument_count(),
            "Routing populated, opening market channel"
        );

        let session = MarketSession::new(
            self.config.session_config(),
            self.router.clone(),
            self.shutdown.clone(),
        );
        let session_handle = tokio::spawn(async move { session.run().await });

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
            }
            () = self.shutdown.cancelled() => {}
        }
        self.shutdown.cancel();

        if let Err(e) = session_handle.await {
            warn!(?e, "Session task join failed");
        }
        if let Err(e) = refresh_handle.await {
            warn!(?e, "Refresh task join failed");
        }

        info!("Final flush of all buffers");
        self.router.flush_all();

        let snap = self.stats.snapshot();
        info!(
            trades = snap.trades,
            ticks = snap.ticks,
            snapshots = snap.snapshots,
            uptime_secs = snap.uptime_secs,
            "Recorder stopped"
        );
        Ok(())
    }

    fn build_source(&self) -> AppResult<Arc<dyn InstrumentSource>> {
        let discovery = &self.config.discovery;
        match discovery.mode {
            DiscoveryMode::Http => {
                let url = discovery
                    .url
                    .as_deref()
                    .ok_or_else(|| AppError::Config("discovery.url required in http mode".to_string()))?;
                Ok(Arc::new(HttpSource::new(url, self.config.fetch_timeout())?))
            }
            DiscoveryMode::Command => {
                let command = discovery.command.as_deref().ok_or_else(|| {
                    AppError::Config("discovery.command required in command mode".to_string())
                })?;
                let output_path = discovery.output_path.as_deref().ok_or_else(|| {
                    AppError::Config("discovery.output_path required in command mode".to_string())
                })?;
                Ok(Arc::new(CommandSource::new(
                    command,
                    output_path,
                    self.config.fetch_timeout(),
                )))
            }
        }
    }
}
