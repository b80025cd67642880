//! Inbound venue messages and the subscribe control message.
//!
//! The CLOB market channel delivers JSON frames that are either a single
//! object or an array of objects, each tagged by `event_type`. Numeric fields
//! arrive as decimal strings; `best_bid`/`best_ask` may be missing or "N/A".

use polyrec_core::TokenId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One decoded market-channel message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MarketMessage {
    Book(BookMessage),
    PriceChange(PriceChangeMessage),
    LastTradePrice(TradeMessage),
    /// Any event kind this recorder does not consume (e.g. `tick_size_change`).
    #[serde(other)]
    Unknown,
}

/// Full L2 book snapshot for one token.
#[derive(Debug, Clone, Deserialize)]
pub struct BookMessage {
    pub asset_id: TokenId,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

/// One price level of a book snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: String,
    pub size: String,
}

/// Batch of top-of-book changes, each addressed to its own token.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangeMessage {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub price_changes: Vec<PriceChangeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangeEntry {
    pub asset_id: TokenId,
    pub price: String,
    pub size: String,
    pub side: String,
    #[serde(default)]
    pub best_bid: Option<String>,
    #[serde(default)]
    pub best_ask: Option<String>,
}

/// Last trade execution for one token.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeMessage {
    pub asset_id: TokenId,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default = "default_side")]
    pub side: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn default_side() -> String {
    "UNKNOWN".to_string()
}

/// Subscribe control message. Full-replacement semantics: always carries the
/// complete token id set, never an incremental diff.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub assets_ids: Vec<TokenId>,
    #[serde(rename = "type")]
    pub channel: String,
}

impl SubscribeRequest {
    pub fn market(assets_ids: Vec<TokenId>) -> Self {
        Self {
            assets_ids,
            channel: "market".to_string(),
        }
    }
}

/// Decode one wire frame into zero or more messages.
///
/// Top-level parse failures are reported; per-element decode failures inside
/// an array frame are logged and skipped so one malformed entry never costs
/// the rest of the batch.
pub fn parse_frame(text: &str) -> Result<Vec<MarketMessage>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    match value {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<MarketMessage>(item) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    debug!(?e, "Skipping undecodable frame element");
                    None
                }
            })
            .collect()),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// Venue timestamps are epoch-millisecond strings; absent or malformed values
/// map to 0 rather than dropping the record.
pub fn parse_timestamp_ms(timestamp: Option<&str>) -> i64 {
    timestamp
        .and_then(|s| s.parse::<f64>().ok())
        .map(|v| v as i64)
        .unwrap_or(0)
}

/// Parse a required decimal-string price/size field.
pub fn parse_price(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an optional best-bid/ask field. "N/A" and missing both map to `None`.
pub fn parse_optional_price(value: Option<&str>) -> Option<f64> {
    value.filter(|v| *v != "N/A").and_then(parse_price)
}
