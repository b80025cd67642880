//! Instrument identity and outcome token types.
//!
//! An instrument is one tradable market (e.g. "BTC up or down, 15m window
//! ending 14:15 UTC") carrying two or more outcome tokens. The exchange
//! addresses everything by token id; the recorder addresses buffers and
//! partitions by instrument identity so that history survives routing
//! rebuilds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange-assigned CLOB token identifier. Opaque decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable instrument identity: asset class, timeframe bucket, event slug.
///
/// The slug alone is unique on the venue; asset class and timeframe are kept
/// because they form the partition path for persisted files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentId {
    /// Asset class, e.g. "BTC" or "ETH".
    pub asset_class: String,
    /// Timeframe bucket, e.g. "1h", "15m", "5m".
    pub timeframe: String,
    /// Venue event slug, unique per instrument.
    pub slug: String,
}

impl InstrumentId {
    pub fn new(
        asset_class: impl Into<String>,
        timeframe: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            asset_class: asset_class.into(),
            timeframe: timeframe.into(),
            slug: slug.into(),
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.asset_class, self.timeframe, self.slug)
    }
}

/// One side of a binary/multi-outcome instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeToken {
    /// Side label as reported by discovery, e.g. "YES", "NO", "UP", "DOWN".
    pub label: String,
    /// Exchange token id for this outcome.
    pub token_id: TokenId,
}

/// A tracked instrument with its resolution time and outcome tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    /// Resolution/end timestamp. Instruments past this point fall out of the
    /// tracked window at the next discovery cycle.
    pub end_date: DateTime<Utc>,
    /// At least two outcome tokens.
    pub tokens: Vec<OutcomeToken>,
}

impl Instrument {
    /// End date formatted for the persisted `end_date` column.
    pub fn end_date_str(&self) -> String {
        self.end_date.to_rfc3339()
    }
}
