//! Session lifecycle integration tests.
//!
//! Drives a real `MarketSession` against a mock venue:
//! - connect and full-set subscribe
//! - inbound frames flowing through routing into the Parquet sink
//! - stall watchdog forcing a reconnect
//! - backoff returning to base after each successful connection

mod integration;
use integration::common::mock_ws::MockWsServer;

use chrono::{TimeZone, Utc};
use polyrec_core::{Instrument, InstrumentId, OutcomeToken, TokenId};
use polyrec_feed::Router;
use polyrec_persistence::ParquetSink;
use polyrec_telemetry::RecorderStats;
use polyrec_ws::{MarketSession, SessionConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn test_instrument() -> Instrument {
    Instrument {
        id: InstrumentId::new("BTC", "15m", "btc-updown-test"),
        end_date: Utc.with_ymd_and_hms(2096, 1, 1, 0, 0, 0).unwrap(),
        tokens: vec![
            OutcomeToken {
                label: "UP".to_string(),
                token_id: TokenId::from("t-up"),
            },
            OutcomeToken {
                label: "DOWN".to_string(),
                token_id: TokenId::from("t-down"),
            },
        ],
    }
}

fn fast_config(url: String) -> SessionConfig {
    SessionConfig {
        url,
        poll_timeout_ms: 50,
        stall_timeout_ms: 200,
        backoff_base_ms: 50,
        backoff_max_ms: 100,
    }
}

/// Router wired to a real Parquet sink in a temp directory.
fn make_router(data_dir: &Path, flush_interval: Duration) -> (Arc<Router>, Arc<RecorderStats>) {
    let stats = Arc::new(RecorderStats::new());
    let router = Arc::new(Router::new(
        stats.clone(),
        Arc::new(ParquetSink::new(data_dir)),
        flush_interval,
    ));
    router.apply_instruments(&[test_instrument()]);
    (router, stats)
}

async fn wait_for<F, Fut>(what: &str, check: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for {what}"));
}

#[tokio::test]
async fn test_session_connects_and_subscribes_full_set() {
    let server = MockWsServer::start().await;
    let dir = TempDir::new().unwrap();
    let (router, _stats) = make_router(dir.path(), Duration::from_secs(3600));

    let shutdown = CancellationToken::new();
    let session = MarketSession::new(fast_config(server.url()), router, shutdown.clone());
    let handle = tokio::spawn(async move { session.run().await });

    wait_for("subscribe message", || async {
        !server.received_messages().await.is_empty()
    })
    .await;

    let subscribe: serde_json::Value =
        serde_json::from_str(&server.received_messages().await[0]).unwrap();
    assert_eq!(subscribe["type"], "market");
    let mut ids: Vec<String> = subscribe["assets_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["t-down", "t-up"]);

    shutdown.cancel();
    handle.await.unwrap().unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_trade_frame_flows_to_parquet() {
    let trade_frame = serde_json::json!({
        "event_type": "last_trade_price",
        "asset_id": "t-up",
        "price": "0.57",
        "size": "12",
        "side": "BUY",
        "timestamp": "1756130400000"
    })
    .to_string();
    let server = MockWsServer::start_with_reply(trade_frame).await;
    let dir = TempDir::new().unwrap();
    // Zero flush interval: the sweep after every poll flushes immediately.
    let (router, stats) = make_router(dir.path(), Duration::from_secs(0));

    let shutdown = CancellationToken::new();
    let session = MarketSession::new(fast_config(server.url()), router, shutdown.clone());
    let handle = tokio::spawn(async move { session.run().await });

    wait_for("trade recorded", || async { stats.trades() == 1 }).await;
    wait_for("parquet file written", || async {
        find_file(dir.path(), "_trades.parquet").is_some()
    })
    .await;

    let path = find_file(dir.path(), "_trades.parquet").unwrap();
    assert!(path.starts_with(dir.path().join("BTC/15m/btc-updown-test")));

    shutdown.cancel();
    handle.await.unwrap().unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_silent_connection_forces_reconnect() {
    let server = MockWsServer::start().await;
    let dir = TempDir::new().unwrap();
    let (router, _stats) = make_router(dir.path(), Duration::from_secs(3600));

    let shutdown = CancellationToken::new();
    // 200ms stall window and a silent server: the watchdog must trip and the
    // session must come back for a second connection.
    let session = MarketSession::new(fast_config(server.url()), router, shutdown.clone());
    let handle = tokio::spawn(async move { session.run().await });

    wait_for("second connection", || async {
        server.connection_count().await >= 2
    })
    .await;

    shutdown.cancel();
    handle.await.unwrap().unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_backoff_stays_at_base_when_connections_succeed() {
    let server = MockWsServer::start_dropping().await;
    let dir = TempDir::new().unwrap();
    let (router, _stats) = make_router(dir.path(), Duration::from_secs(3600));

    let shutdown = CancellationToken::new();
    // Every connection succeeds (handshake + subscribe) and is then dropped
    // by the server. Each successful connect resets the backoff counter, so
    // every reconnect delay must be the base delay, never a doubled one.
    let config = SessionConfig {
        url: server.url(),
        poll_timeout_ms: 50,
        stall_timeout_ms: 60_000,
        backoff_base_ms: 200,
        backoff_max_ms: 5_000,
    };
    let session = MarketSession::new(config, router, shutdown.clone());
    let handle = tokio::spawn(async move { session.run().await });

    wait_for("six connections", || async {
        server.connection_count().await >= 6
    })
    .await;

    let times = server.connection_times().await;
    for pair in times.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(
            gap < Duration::from_millis(500),
            "Reconnect gap grew to {gap:?}; backoff did not reset to base after a successful connection"
        );
    }

    shutdown.cancel();
    handle.await.unwrap().unwrap();
    server.shutdown().await;
}

fn find_file(root: &Path, suffix: &str) -> Option<std::path::PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file(&path, suffix) {
                return Some(found);
            }
        } else if path.file_name()?.to_str()?.ends_with(suffix) {
            return Some(path);
        }
    }
    None
}
