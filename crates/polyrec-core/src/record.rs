//! Persisted record kinds.
//!
//! Field sets mirror what the venue delivers: numeric fields are parsed to
//! `f64` at the boundary, side labels are passed through verbatim, and book
//! levels are kept as serialized JSON blobs.

use crate::instrument::TokenId;
use serde::{Deserialize, Serialize};

/// A trade execution (`last_trade_price` on the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Venue timestamp in epoch milliseconds (0 when absent).
    pub timestamp_ms: i64,
    pub market_slug: String,
    pub asset_id: TokenId,
    pub price: f64,
    pub size: f64,
    pub side: String,
    /// Instrument resolution time (RFC 3339).
    pub end_date: String,
}

/// A top-of-book tick (one entry of a `price_change` batch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub timestamp_ms: i64,
    pub market_slug: String,
    pub asset_id: TokenId,
    pub price: f64,
    pub size: f64,
    pub side: String,
    /// Best bid at the time of the change; absent when the venue omits it.
    pub best_bid: Option<f64>,
    /// Best ask at the time of the change; absent when the venue omits it.
    pub best_ask: Option<f64>,
}

/// A full L2 order book snapshot (`book` on the wire).
///
/// Bid and ask ladders are stored as opaque JSON blobs; downstream analysis
/// deserializes them lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub timestamp_ms: i64,
    pub market_slug: String,
    pub asset_id: TokenId,
    /// Ordered bid levels, serialized JSON.
    pub bids: String,
    /// Ordered ask levels, serialized JSON.
    pub asks: String,
    pub end_date: String,
}
