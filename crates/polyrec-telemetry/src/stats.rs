//! Process-wide recorder counters.
//!
//! Modeled as an explicit handle passed into every component that writes it,
//! rather than ambient global state. All counters are monotonic except the
//! tracked-market set, which follows the discovery window.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Shared counter handle. Cheap to clone behind an `Arc`.
#[derive(Debug)]
pub struct RecorderStats {
    trades: AtomicU64,
    ticks: AtomicU64,
    snapshots: AtomicU64,
    active_instruments: AtomicU64,
    /// Unix ms deadline of the next buffer flush (0 until the first flush is scheduled).
    next_flush_unix_ms: AtomicI64,
    /// Unix ms deadline of the next discovery refresh.
    next_refresh_unix_ms: AtomicI64,
    started_at: DateTime<Utc>,
    /// Per-instrument trade counts, keyed by slug. Entries exist only while
    /// the instrument is in the tracked window.
    market_trades: DashMap<String, u64>,
}

impl Default for RecorderStats {
    fn default() -> Self {
        Self {
            trades: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            snapshots: AtomicU64::new(0),
            active_instruments: AtomicU64::new(0),
            next_flush_unix_ms: AtomicI64::new(0),
            next_refresh_unix_ms: AtomicI64::new(0),
            started_at: Utc::now(),
            market_trades: DashMap::new(),
        }
    }
}

impl RecorderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one trade; also bumps the per-instrument counter when the slug
    /// is still tracked.
    pub fn record_trade(&self, slug: &str) {
        self.trades.fetch_add(1, Ordering::Relaxed);
        if let Some(mut count) = self.market_trades.get_mut(slug) {
            *count += 1;
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot(&self) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    /// Replace the tracked-market set after a discovery rebuild. Existing
    /// per-instrument counts survive; evicted slugs are dropped.
    pub fn set_tracked_markets(&self, slugs: &[String]) {
        self.market_trades
            .retain(|slug, _| slugs.iter().any(|s| s == slug));
        for slug in slugs {
            self.market_trades.entry(slug.clone()).or_insert(0);
        }
        self.active_instruments
            .store(slugs.len() as u64, Ordering::Relaxed);
    }

    pub fn set_next_flush(&self, deadline: DateTime<Utc>) {
        self.next_flush_unix_ms
            .store(deadline.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn set_next_refresh(&self, deadline: DateTime<Utc>) {
        self.next_refresh_unix_ms
            .store(deadline.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn trades(&self) -> u64 {
        self.trades.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    pub fn active_instruments(&self) -> u64 {
        self.active_instruments.load(Ordering::Relaxed)
    }

    /// Point-in-time read model for the presentation layer.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            trades: self.trades(),
            ticks: self.ticks(),
            snapshots: self.snapshots(),
            active_instruments: self.active_instruments(),
            next_flush_unix_ms: self.next_flush_unix_ms.load(Ordering::Relaxed),
            next_refresh_unix_ms: self.next_refresh_unix_ms.load(Ordering::Relaxed),
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0),
            market_trades: self
                .market_trades
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }
}

/// Serializable snapshot of all counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub trades: u64,
    pub ticks: u64,
    pub snapshots: u64,
    pub active_instruments: u64,
    pub next_flush_unix_ms: i64,
    pub next_refresh_unix_ms: i64,
    pub uptime_secs: i64,
    pub market_trades: BTreeMap<String, u64>,
}
