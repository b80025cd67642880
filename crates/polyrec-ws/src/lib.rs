//! WebSocket subscription session for the Polymarket CLOB market feed.
//!
//! Provides robust connectivity with:
//! - Automatic reconnection with exponential backoff
//! - Watchdog detection of open-but-silent connections
//! - Full-replacement resubscription when the tracked token set changes
//! - Tagged decoding of `book` / `price_change` / `last_trade_price` frames

pub mod error;
pub mod message;
pub mod session;

pub use error::{WsError, WsResult};
pub use message::{
    parse_frame, parse_optional_price, parse_price, parse_timestamp_ms, BookLevel, BookMessage,
    MarketMessage, PriceChangeEntry, PriceChangeMessage, SubscribeRequest, TradeMessage,
};
pub use session::{MarketSession, SessionConfig, SessionHandler, SessionState};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
