//! Deduplicating per-instrument event buffer.
//!
//! Accumulates trades, ticks and book snapshots between flushes. The upstream
//! feed re-emits unchanged top-of-book state on unrelated events; consecutive
//! duplicate ticks and snapshots are suppressed so files are not dominated by
//! redundant rows. The tick dedup key deliberately excludes the timestamp: an
//! identical price/size/side/bbo tuple at a later time is still a duplicate.

use chrono::Utc;
use polyrec_core::{
    InstrumentId, PartitionStamp, RecordSink, SnapshotRecord, TickRecord, TokenId, TradeRecord,
};
use polyrec_telemetry::RecorderStats;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Dedup key for ticks. No timestamp by design.
#[derive(Debug, Clone, PartialEq)]
struct TickKey {
    price: f64,
    size: f64,
    side: String,
    best_bid: Option<f64>,
    best_ask: Option<f64>,
}

/// Accumulates unflushed records for one instrument.
///
/// Long-lived: survives routing-table rebuilds as long as its instrument
/// stays in the tracked window, and is destroyed only after a final flush.
pub struct EventBuffer {
    instrument: InstrumentId,
    end_date: String,
    trades: Vec<TradeRecord>,
    ticks: Vec<TickRecord>,
    snapshots: Vec<SnapshotRecord>,
    last_tick: Option<TickKey>,
    last_snapshot: Option<(String, String)>,
    last_flush: Instant,
    flush_interval: Duration,
}

impl EventBuffer {
    pub fn new(instrument: InstrumentId, end_date: String, flush_interval: Duration) -> Self {
        Self {
            instrument,
            end_date,
            trades: Vec::new(),
            ticks: Vec::new(),
            snapshots: Vec::new(),
            last_tick: None,
            last_snapshot: None,
            last_flush: Instant::now(),
            flush_interval,
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Append a trade. Trades are never deduplicated.
    pub fn record_trade(
        &mut self,
        timestamp_ms: i64,
        asset_id: TokenId,
        price: f64,
        size: f64,
        side: String,
        stats: &RecorderStats,
    ) {
        self.trades.push(TradeRecord {
            timestamp_ms,
            market_slug: self.instrument.slug.clone(),
            asset_id,
            price,
            size,
            side,
            end_date: self.end_date.clone(),
        });
        stats.record_trade(&self.instrument.slug);
    }

    /// Append a tick unless it repeats the previous one.
    #[allow(clippy::too_many_arguments)]
    pub fn record_tick(
        &mut self,
        timestamp_ms: i64,
        asset_id: TokenId,
        price: f64,
        size: f64,
        side: String,
        best_bid: Option<f64>,
        best_ask: Option<f64>,
        stats: &RecorderStats,
    ) {
        let key = TickKey {
            price,
            size,
            side: side.clone(),
            best_bid,
            best_ask,
        };
        if self.last_tick.as_ref() == Some(&key) {
            return;
        }

        self.ticks.push(TickRecord {
            timestamp_ms,
            market_slug: self.instrument.slug.clone(),
            asset_id,
            price,
            size,
            side,
            best_bid,
            best_ask,
        });
        self.last_tick = Some(key);
        stats.record_tick();
    }

    /// Append a book snapshot unless the (bids, asks) pair is unchanged.
    pub fn record_snapshot(
        &mut self,
        timestamp_ms: i64,
        asset_id: TokenId,
        bids: String,
        asks: String,
        stats: &RecorderStats,
    ) {
        if self
            .last_snapshot
            .as_ref()
            .is_some_and(|(b, a)| *b == bids && *a == asks)
        {
            return;
        }

        self.last_snapshot = Some((bids.clone(), asks.clone()));
        self.snapshots.push(SnapshotRecord {
            timestamp_ms,
            market_slug: self.instrument.slug.clone(),
            asset_id,
            bids,
            asks,
            end_date: self.end_date.clone(),
        });
        stats.record_snapshot();
    }

    /// True when the flush interval has elapsed since the last flush.
    pub fn flush_due(&self, now: Instant) -> bool {
        now.duration_since(self.last_flush) >= self.flush_interval
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.ticks.is_empty() && self.snapshots.is_empty()
    }

    /// Number of unflushed records of each kind: (trades, ticks, snapshots).
    pub fn pending(&self) -> (usize, usize, usize) {
        (self.trades.len(), self.ticks.len(), self.snapshots.len())
    }

    /// Hand every non-empty list to the sink under one partition stamp, then
    /// clear. Sink errors are logged and swallowed: a bad write must never
    /// take the session down, and the records of a failed attempt are dropped
    /// (accepted small-loss-on-error policy).
    pub fn flush(&mut self, sink: &dyn RecordSink, stats: &RecorderStats) {
        if !self.is_empty() {
            let stamp = PartitionStamp::now();

            if !self.trades.is_empty() {
                if let Err(e) = sink.write_trades(&self.instrument, &stamp, &self.trades) {
                    warn!(instrument = %self.instrument, error = %e, "Trade flush failed, records dropped");
                }
                self.trades.clear();
            }

            if !self.ticks.is_empty() {
                if let Err(e) = sink.write_ticks(&self.instrument, &stamp, &self.ticks) {
                    warn!(instrument = %self.instrument, error = %e, "Tick flush failed, records dropped");
                }
                self.ticks.clear();
            }

            if !self.snapshots.is_empty() {
                if let Err(e) = sink.write_snapshots(&self.instrument, &stamp, &self.snapshots) {
                    warn!(instrument = %self.instrument, error = %e, "Snapshot flush failed, records dropped");
                }
                self.snapshots.clear();
            }

            debug!(instrument = %self.instrument, "Buffer flushed");
        }

        self.last_flush = Instant::now();
        if let Ok(interval) = chrono::Duration::from_std(self.flush_interval) {
            stats.set_next_flush(Utc::now() + interval);
        }
    }
}
