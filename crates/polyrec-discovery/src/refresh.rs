//! Periodic discovery refresh loop.
//!
//! Fixed-period driver of the routing table: fetch, rebuild, install. A
//! failed cycle is logged and skipped; the previous generation stays
//! authoritative until a later cycle succeeds. The first cycle runs
//! immediately so startup does not wait a full period for its subscriptions.

use crate::source::InstrumentSource;
use chrono::Utc;
use polyrec_feed::Router;
use polyrec_telemetry::RecorderStats;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct RefreshLoop {
    source: Arc<dyn InstrumentSource>,
    router: Arc<Router>,
    stats: Arc<RecorderStats>,
    period: Duration,
    shutdown: CancellationToken,
}

impl RefreshLoop {
    pub fn new(
        source: Arc<dyn InstrumentSource>,
        router: Arc<Router>,
        stats: Arc<RecorderStats>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            router,
            stats,
            period,
            shutdown,
        }
    }

    pub async fn run(self) {
        info!(period_secs = self.period.as_secs(), "Discovery refresh loop started");

        loop {
            self.refresh_once().await;

            if let Ok(period) = chrono::Duration::from_std(self.period) {
                self.stats.set_next_refresh(Utc::now() + period);
            }

            tokio::select! {
                () = tokio::time::sleep(self.period) => {}
                () = self.shutdown.cancelled() => {
                    info!("Discovery refresh loop stopped");
                    return;
                }
            }
        }
    }

    async fn refresh_once(&self) {
        match self.source.fetch().await {
            Ok(snapshot) => {
                info!(
                    instruments = snapshot.instruments.len(),
                    "Discovery cycle complete"
                );
                self.router.apply_instruments(&snapshot.instruments);
            }
            Err(e) => {
                warn!(error = %e, "Discovery cycle failed, keeping previous routing");
            }
        }
    }
}
