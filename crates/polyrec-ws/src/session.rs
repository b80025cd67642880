//! Subscription session state machine.
//!
//! One logical connection that survives venue restarts: connect, subscribe to
//! every tracked token, stream, and on any failure (drop, transport error, or
//! watchdog stall) back off exponentially and reconnect. The tracked token
//! set is owned elsewhere and re-read every loop iteration; when it changes
//! the full set is re-sent as a single subscribe message.

use crate::error::{WsError, WsResult};
use crate::message::{parse_frame, MarketMessage, SubscribeRequest};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use polyrec_core::TokenId;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Market channel WebSocket URL.
    pub url: String,
    /// Bounded receive poll; the loop wakes at least this often.
    pub poll_timeout_ms: u64,
    /// Watchdog: force a reconnect when no frame arrives for this long.
    pub stall_timeout_ms: u64,
    /// Base delay for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay for exponential backoff.
    pub backoff_max_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string(),
            poll_timeout_ms: 1_000,
            stall_timeout_ms: 60_000,
            backoff_base_ms: 3_000,
            backoff_max_ms: 60_000,
        }
    }
}

/// Session state, exposed for telemetry and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Subscribed,
    Streaming,
    Backoff,
    Disconnected,
}

/// Collaborator the session streams into.
///
/// Implementations must be infallible from the session's point of view:
/// per-message problems are handled (or skipped) internally so a bad payload
/// never tears down the connection.
pub trait SessionHandler: Send + Sync {
    /// Current full subscription key set.
    fn active_tokens(&self) -> Vec<TokenId>;
    /// Dispatch one decoded message.
    fn handle_message(&self, msg: &MarketMessage);
    /// Called once per loop iteration, after message handling or on a poll
    /// timeout. The flush sweep runs here; there is no separate timer task.
    fn maintain(&self);
}

/// Reconnecting market-channel session.
pub struct MarketSession<H> {
    config: SessionConfig,
    handler: Arc<H>,
    state: Arc<RwLock<SessionState>>,
    reconnect_count: Arc<RwLock<u32>>,
    shutdown: CancellationToken,
}

impl<H: SessionHandler> MarketSession<H> {
    pub fn new(config: SessionConfig, handler: Arc<H>, shutdown: CancellationToken) -> Self {
        Self {
            config,
            handler,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            reconnect_count: Arc::new(RwLock::new(0)),
            shutdown,
        }
    }

    /// Get current session state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Run the session until shutdown. Only returns an error for conditions
    /// the reconnect loop cannot recover from (currently none).
    pub async fn run(&self) -> WsResult<()> {
        loop {
            if self.shutdown.is_cancelled() {
                *self.state.write() = SessionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = SessionState::Connecting;

            match self.stream_once().await {
                Ok(()) => {
                    // Clean exit only happens on shutdown.
                    info!("Session closed");
                    *self.state.write() = SessionState::Disconnected;
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Session ended, scheduling reconnect");
                }
            }

            if self.shutdown.is_cancelled() {
                *self.state.write() = SessionState::Disconnected;
                return Ok(());
            }

            // stream_once zeroes the counter on a successful connect, so
            // this counts consecutive failures, not lifetime failures.
            let attempt = self.reconnect_count.read().saturating_add(1);
            *self.reconnect_count.write() = attempt;
            *self.state.write() = SessionState::Backoff;

            let delay = backoff_delay(
                attempt,
                self.config.backoff_base_ms,
                self.config.backoff_max_ms,
            );
            warn!(attempt, delay_ms = delay.as_millis(), "Reconnecting after backoff");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => {
                    *self.state.write() = SessionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    /// One connection lifetime: connect, subscribe, stream until failure or
    /// shutdown. `Ok(())` means shutdown; every other exit is an `Err` that
    /// sends the caller through backoff.
    async fn stream_once(&self) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to market channel");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        // Connection is up; backoff starts over on the next failure.
        *self.reconnect_count.write() = 0;
        *self.state.write() = SessionState::Subscribed;
        info!("Market channel connected");

        let poll_timeout = Duration::from_millis(self.config.poll_timeout_ms);
        let stall_timeout = Duration::from_millis(self.config.stall_timeout_ms);
        let mut current_subscription: HashSet<TokenId> = HashSet::new();
        let mut last_frame = Instant::now();

        loop {
            // Full-replacement resubscribe whenever the routing key set
            // changed. Idempotent, and tolerant of a lost subscribe message:
            // the next divergence simply sends the whole set again.
            let latest = self.handler.active_tokens();
            let latest_set: HashSet<TokenId> = latest.iter().cloned().collect();
            if latest_set != current_subscription && !latest.is_empty() {
                info!(tokens = latest.len(), "Subscription set changed, resubscribing");
                let request = SubscribeRequest::market(latest);
                write
                    .send(Message::Text(serde_json::to_string(&request)?))
                    .await?;
                current_subscription = latest_set;
                *self.state.write() = SessionState::Streaming;
            }

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested, closing market channel");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(?e, "Close frame not delivered");
                    }
                    return Ok(());
                }

                polled = tokio::time::timeout(poll_timeout, read.next()) => {
                    match polled {
                        // Poll timeout: no frame this tick, check the watchdog.
                        Err(_) => {
                            let idle = last_frame.elapsed();
                            if idle >= stall_timeout {
                                return Err(WsError::Stalled { idle_secs: idle.as_secs() });
                            }
                        }
                        Ok(Some(Ok(Message::Text(text)))) => {
                            last_frame = Instant::now();
                            self.handle_frame(&text);
                        }
                        Ok(Some(Ok(Message::Ping(data)))) => {
                            last_frame = Instant::now();
                            write.send(Message::Pong(data)).await?;
                        }
                        Ok(Some(Ok(Message::Close(frame)))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Market channel closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Ok(Some(Err(e))) => {
                            return Err(e.into());
                        }
                        Ok(None) => {
                            return Err(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                        Ok(Some(Ok(_))) => {}
                    }
                }
            }

            // Flush sweep: the sole flush trigger, once per iteration.
            self.handler.maintain();
        }
    }

    /// Decode and dispatch one text frame. Never fails: decode problems are
    /// logged and the frame dropped.
    fn handle_frame(&self, text: &str) {
        match parse_frame(text) {
            Ok(messages) => {
                for msg in &messages {
                    self.handler.handle_message(msg);
                }
            }
            Err(e) => {
                debug!(?e, "Undecodable frame dropped");
            }
        }
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped.
fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(max_ms))
}
