//! Message dispatch into the routing table.
//!
//! `Router` owns the shared routing handle, the counter handle and the sink,
//! and is the session's collaborator: it resolves each inbound message to an
//! owning buffer, runs the timed flush sweep, and applies discovery results.

use crate::buffer::EventBuffer;
use crate::routing::{RoutingTable, SharedRouting};
use polyrec_core::{Instrument, RecordSink, TokenId};
use polyrec_telemetry::RecorderStats;
use polyrec_ws::{
    parse_optional_price, parse_price, parse_timestamp_ms, BookMessage, MarketMessage,
    PriceChangeMessage, SessionHandler, TradeMessage,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Routing and ingestion hub shared by the session and the discovery loop.
pub struct Router {
    routing: SharedRouting,
    stats: Arc<RecorderStats>,
    sink: Arc<dyn RecordSink>,
    flush_interval: Duration,
}

impl Router {
    pub fn new(
        stats: Arc<RecorderStats>,
        sink: Arc<dyn RecordSink>,
        flush_interval: Duration,
    ) -> Self {
        Self {
            routing: SharedRouting::new(),
            stats,
            sink,
            flush_interval,
        }
    }

    pub fn routing(&self) -> &SharedRouting {
        &self.routing
    }

    /// Apply one discovery result: rebuild the table, install it atomically,
    /// then give every evicted instrument's buffer its final flush. The
    /// ordering matters: after the install no message can route to an evicted
    /// buffer, so the final flush cannot race an append.
    pub fn apply_instruments(&self, instruments: &[Instrument]) {
        let old = self.routing.current();
        let (next, evicted) = RoutingTable::rebuild(&old, instruments, self.flush_interval);

        info!(
            instruments = next.instrument_count(),
            tokens = next.token_ids().len(),
            evicted = evicted.len(),
            "Routing table rebuilt"
        );

        let slugs = next.slugs();
        self.routing.install(Arc::new(next));
        self.stats.set_tracked_markets(&slugs);

        for buffer in evicted {
            let mut buffer = buffer.lock();
            debug!(instrument = %buffer.instrument(), "Final flush for evicted instrument");
            buffer.flush(self.sink.as_ref(), &self.stats);
        }
    }

    /// Block until the first successful discovery populates the table.
    pub async fn wait_ready(&self) {
        self.routing.wait_non_empty().await;
    }

    /// Flush every buffer reachable from the current table, due or not.
    /// Used on shutdown to minimize the data-loss window.
    pub fn flush_all(&self) {
        for buffer in self.routing.current().unique_buffers() {
            buffer.lock().flush(self.sink.as_ref(), &self.stats);
        }
    }

    fn with_buffer(&self, token_id: &TokenId, f: impl FnOnce(&mut EventBuffer)) {
        // Unknown token ids are expected: the message raced an eviction.
        match self.routing.current().lookup(token_id) {
            Some(entry) => f(&mut entry.buffer.lock()),
            None => trace!(token = %token_id, "Message for untracked token dropped"),
        }
    }

    fn on_book(&self, book: &BookMessage) {
        let Ok(bids) = serde_json::to_string(&book.bids) else {
            return;
        };
        let Ok(asks) = serde_json::to_string(&book.asks) else {
            return;
        };
        let ts = parse_timestamp_ms(book.timestamp.as_deref());

        self.with_buffer(&book.asset_id, |buffer| {
            buffer.record_snapshot(ts, book.asset_id.clone(), bids, asks, &self.stats);
        });
    }

    fn on_price_change(&self, batch: &PriceChangeMessage) {
        let ts = parse_timestamp_ms(batch.timestamp.as_deref());

        for change in &batch.price_changes {
            let (Some(price), Some(size)) = (parse_price(&change.price), parse_price(&change.size))
            else {
                debug!(token = %change.asset_id, "Price change with unparsable numerics skipped");
                continue;
            };
            let best_bid = parse_optional_price(change.best_bid.as_deref());
            let best_ask = parse_optional_price(change.best_ask.as_deref());

            self.with_buffer(&change.asset_id, |buffer| {
                buffer.record_tick(
                    ts,
                    change.asset_id.clone(),
                    price,
                    size,
                    change.side.clone(),
                    best_bid,
                    best_ask,
                    &self.stats,
                );
            });
        }
    }

    fn on_trade(&self, trade: &TradeMessage) {
        let (Some(price), Some(size)) = (
            trade.price.as_deref().and_then(parse_price),
            trade.size.as_deref().and_then(parse_price),
        ) else {
            debug!(token = %trade.asset_id, "Trade without price/size skipped");
            return;
        };
        let ts = parse_timestamp_ms(trade.timestamp.as_deref());

        self.with_buffer(&trade.asset_id, |buffer| {
            buffer.record_trade(
                ts,
                trade.asset_id.clone(),
                price,
                size,
                trade.side.clone(),
                &self.stats,
            );
        });
    }
}

impl SessionHandler for Router {
    fn active_tokens(&self) -> Vec<TokenId> {
        self.routing.current().token_ids()
    }

    fn handle_message(&self, msg: &MarketMessage) {
        match msg {
            MarketMessage::Book(book) => self.on_book(book),
            MarketMessage::PriceChange(batch) => self.on_price_change(batch),
            MarketMessage::LastTradePrice(trade) => self.on_trade(trade),
            MarketMessage::Unknown => {}
        }
    }

    fn maintain(&self) {
        let now = Instant::now();
        for buffer in self.routing.current().unique_buffers() {
            let mut buffer = buffer.lock();
            if buffer.flush_due(now) {
                buffer.flush(self.sink.as_ref(), &self.stats);
            }
        }
    }
}
