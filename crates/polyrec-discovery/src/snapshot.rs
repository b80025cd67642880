//! Raw discovery document shape.
//!
//! The external fetcher emits one JSON document covering every event it knows
//! about, grouped by asset class and timeframe:
//!
//! ```json
//! {"markets": {"BTC": {"15m": {"events": [
//!   {"event_slug": "...", "end_date": "2026-08-25T14:15:00Z",
//!    "tokens": {"up": {"token_id": "..."}, "down": {"token_id": "..."}}}
//! ]}}}}
//! ```
//!
//! Everything is optional at the wire level; window selection decides what is
//! usable.

use chrono::{DateTime, Utc};
use polyrec_core::Instrument;
use serde::Deserialize;
use std::collections::HashMap;

/// Top-level discovery document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryDocument {
    /// Asset class ("BTC", "ETH", ...) -> timeframe ("1h", ...) -> events.
    #[serde(default)]
    pub markets: HashMap<String, HashMap<String, TimeframeEvents>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeframeEvents {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// One event as the fetcher reports it. Fields the selection needs may be
/// absent or malformed; such events are skipped, never fatal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event_slug: Option<String>,
    /// RFC 3339 resolution time.
    #[serde(default)]
    pub end_date: Option<String>,
    /// Outcome label ("yes"/"no" or "up"/"down") -> token.
    #[serde(default)]
    pub tokens: HashMap<String, RawToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawToken {
    pub token_id: String,
}

/// One successfully completed discovery cycle.
#[derive(Debug, Clone)]
pub struct DiscoverySnapshot {
    pub instruments: Vec<Instrument>,
    pub fetched_at: DateTime<Utc>,
}
