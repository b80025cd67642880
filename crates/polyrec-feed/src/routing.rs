//! Token-to-buffer routing table.
//!
//! The table maps every subscribed outcome token id to its instrument and
//! owning buffer. Discovery rebuilds it wholesale on each cycle; buffers are
//! handed across generations by instrument identity so unflushed history is
//! never lost when the table around it changes.

use crate::buffer::EventBuffer;
use parking_lot::{Mutex, RwLock};
use polyrec_core::{Instrument, TokenId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub type SharedBuffer = Arc<Mutex<EventBuffer>>;

/// One routing entry: token id -> instrument metadata + owning buffer.
/// All outcome tokens of one instrument share the same buffer.
#[derive(Clone)]
pub struct RoutingEntry {
    pub instrument: Arc<Instrument>,
    /// Outcome label of this token ("YES", "NO", "UP", "DOWN", ...).
    pub side_label: String,
    pub buffer: SharedBuffer,
}

/// Immutable routing generation. Replaced atomically, never mutated in place.
#[derive(Default)]
pub struct RoutingTable {
    entries: HashMap<TokenId, RoutingEntry>,
    /// Secondary view keyed by instrument slug, used for buffer hand-off
    /// across rebuilds and for the unique-buffer flush sweep.
    buffers: HashMap<String, SharedBuffer>,
}

impl RoutingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup(&self, token_id: &TokenId) -> Option<&RoutingEntry> {
        self.entries.get(token_id)
    }

    /// Every token id in this generation.
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.entries.keys().cloned().collect()
    }

    /// One buffer per instrument (not per token).
    pub fn unique_buffers(&self) -> Vec<SharedBuffer> {
        self.buffers.values().cloned().collect()
    }

    /// Tracked instrument slugs.
    pub fn slugs(&self) -> Vec<String> {
        self.buffers.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn instrument_count(&self) -> usize {
        self.buffers.len()
    }

    /// Build the next generation from a discovery result.
    ///
    /// Pure with respect to the old table: the caller installs the returned
    /// table and then flushes the returned evicted buffers, in that order, so
    /// no message can be appended to a buffer while its final flush runs.
    ///
    /// Instruments with fewer than two outcome tokens are skipped. An
    /// instrument present in both generations keeps its buffer by identity.
    pub fn rebuild(
        old: &RoutingTable,
        instruments: &[Instrument],
        flush_interval: Duration,
    ) -> (RoutingTable, Vec<SharedBuffer>) {
        let mut next = RoutingTable::empty();

        for instrument in instruments {
            if instrument.tokens.len() < 2 {
                debug!(id = %instrument.id, "Skipping instrument with fewer than two outcome tokens");
                continue;
            }

            let buffer = old
                .buffers
                .get(&instrument.id.slug)
                .cloned()
                .unwrap_or_else(|| {
                    Arc::new(Mutex::new(EventBuffer::new(
                        instrument.id.clone(),
                        instrument.end_date_str(),
                        flush_interval,
                    )))
                });

            let shared = Arc::new(instrument.clone());
            for token in &instrument.tokens {
                next.entries.insert(
                    token.token_id.clone(),
                    RoutingEntry {
                        instrument: shared.clone(),
                        side_label: token.label.clone(),
                        buffer: buffer.clone(),
                    },
                );
            }
            next.buffers.insert(instrument.id.slug.clone(), buffer);
        }

        let evicted = old
            .buffers
            .iter()
            .filter(|(slug, _)| !next.buffers.contains_key(*slug))
            .map(|(_, buffer)| buffer.clone())
            .collect();

        (next, evicted)
    }
}

/// Atomically swappable handle on the current routing generation.
///
/// Readers take a cheap `Arc` clone of the whole table and iterate it without
/// ever observing a partial update; writers replace the pointer in one step.
pub struct SharedRouting {
    current: RwLock<Arc<RoutingTable>>,
}

impl Default for SharedRouting {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(RoutingTable::empty())),
        }
    }
}

impl SharedRouting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation.
    pub fn current(&self) -> Arc<RoutingTable> {
        self.current.read().clone()
    }

    /// Install a new generation. Single pointer swap.
    pub fn install(&self, table: Arc<RoutingTable>) {
        *self.current.write() = table;
    }

    /// Block until the table is non-empty. Used as the startup gate: the
    /// session has nothing to subscribe to before the first discovery cycle.
    pub async fn wait_non_empty(&self) {
        while self.current().is_empty() {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use polyrec_core::{InstrumentId, OutcomeToken, TokenId};
    use polyrec_telemetry::RecorderStats;

    fn make_instrument(slug: &str, yes: &str, no: &str) -> Instrument {
        Instrument {
            id: InstrumentId::new("BTC", "15m", slug),
            end_date: Utc.with_ymd_and_hms(2026, 8, 25, 15, 0, 0).unwrap(),
            tokens: vec![
                OutcomeToken {
                    label: "YES".to_string(),
                    token_id: TokenId::from(yes),
                },
                OutcomeToken {
                    label: "NO".to_string(),
                    token_id: TokenId::from(no),
                },
            ],
        }
    }

    const INTERVAL: Duration = Duration::from_secs(30);

    #[test]
    fn test_rebuild_routes_all_tokens_to_one_buffer() {
        let old = RoutingTable::empty();
        let (table, evicted) =
            RoutingTable::rebuild(&old, &[make_instrument("a", "t1", "t2")], INTERVAL);

        assert!(evicted.is_empty());
        assert_eq!(table.token_ids().len(), 2);
        assert_eq!(table.instrument_count(), 1);

        let yes = table.lookup(&TokenId::from("t1")).unwrap();
        let no = table.lookup(&TokenId::from("t2")).unwrap();
        assert!(Arc::ptr_eq(&yes.buffer, &no.buffer));
        assert_eq!(yes.side_label, "YES");
        assert_eq!(no.side_label, "NO");
    }

    #[test]
    fn test_rebuild_reuses_buffer_by_identity() {
        let (gen1, _) = RoutingTable::rebuild(
            &RoutingTable::empty(),
            &[make_instrument("a", "t1", "t2")],
            INTERVAL,
        );
        let buffer_gen1 = gen1.lookup(&TokenId::from("t1")).unwrap().buffer.clone();

        // Same instrument, new token ids in the discovery result: buffer
        // hand-off is by slug identity, not by token slot.
        let (gen2, evicted) =
            RoutingTable::rebuild(&gen1, &[make_instrument("a", "t3", "t4")], INTERVAL);

        assert!(evicted.is_empty());
        let buffer_gen2 = gen2.lookup(&TokenId::from("t3")).unwrap().buffer.clone();
        assert!(Arc::ptr_eq(&buffer_gen1, &buffer_gen2));
    }

    #[test]
    fn test_repeated_cycles_construct_one_buffer() {
        let instrument = make_instrument("a", "t1", "t2");
        let (gen1, _) =
            RoutingTable::rebuild(&RoutingTable::empty(), &[instrument.clone()], INTERVAL);
        let (gen2, _) = RoutingTable::rebuild(&gen1, &[instrument], INTERVAL);

        assert!(Arc::ptr_eq(
            &gen1.unique_buffers()[0],
            &gen2.unique_buffers()[0]
        ));
    }

    #[test]
    fn test_unflushed_records_survive_rebuild() {
        let stats = RecorderStats::new();
        let (gen1, _) = RoutingTable::rebuild(
            &RoutingTable::empty(),
            &[make_instrument("a", "t1", "t2")],
            INTERVAL,
        );

        gen1.lookup(&TokenId::from("t1")).unwrap().buffer.lock().record_trade(
            1,
            TokenId::from("t1"),
            0.5,
            1.0,
            "BUY".to_string(),
            &stats,
        );

        let (gen2, _) =
            RoutingTable::rebuild(&gen1, &[make_instrument("a", "t1", "t2")], INTERVAL);
        let pending = gen2
            .lookup(&TokenId::from("t1"))
            .unwrap()
            .buffer
            .lock()
            .pending();
        assert_eq!(pending.0, 1);
    }

    #[test]
    fn test_dropped_instrument_is_evicted() {
        let (gen1, _) = RoutingTable::rebuild(
            &RoutingTable::empty(),
            &[
                make_instrument("a", "t1", "t2"),
                make_instrument("b", "t3", "t4"),
            ],
            INTERVAL,
        );

        let (gen2, evicted) =
            RoutingTable::rebuild(&gen1, &[make_instrument("a", "t1", "t2")], INTERVAL);

        assert_eq!(gen2.instrument_count(), 1);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].lock().instrument().slug, "b");
        assert!(gen2.lookup(&TokenId::from("t3")).is_none());
    }

    #[test]
    fn test_single_token_instrument_skipped() {
        let mut one_sided = make_instrument("a", "t1", "t2");
        one_sided.tokens.truncate(1);

        let (table, _) = RoutingTable::rebuild(&RoutingTable::empty(), &[one_sided], INTERVAL);
        assert!(table.is_empty());
    }

    #[test]
    fn test_shared_routing_install_swaps_pointer() {
        let routing = SharedRouting::new();
        assert!(routing.current().is_empty());

        let (table, _) = RoutingTable::rebuild(
            &RoutingTable::empty(),
            &[make_instrument("a", "t1", "t2")],
            INTERVAL,
        );
        let table = Arc::new(table);
        routing.install(table.clone());

        assert!(Arc::ptr_eq(&routing.current(), &table));
    }
}
