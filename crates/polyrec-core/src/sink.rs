//! The sink contract buffers flush through.

use crate::error::SinkResult;
use crate::instrument::InstrumentId;
use crate::record::{SnapshotRecord, TickRecord, TradeRecord};
use chrono::{DateTime, Utc};

/// Time partition for one flush, computed once at flush start.
///
/// All record kinds flushed together share the same stamp so they land in the
/// same hour bucket even if the flush itself takes non-trivial wall time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStamp {
    /// Calendar date folder, `YYYY-MM-DD` (UTC).
    pub date: String,
    /// Hour bucket file prefix, `HH_00` (UTC).
    pub hour: String,
}

impl PartitionStamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            date: at.format("%Y-%m-%d").to_string(),
            hour: at.format("%H_00").to_string(),
        }
    }
}

/// Durable destination for flushed buffers.
///
/// Implementations write one file per record kind per partition window and
/// must concatenate when re-flushing into an existing window. The recorder
/// guarantees a single writer per instrument, so implementations need no
/// cross-process locking.
pub trait RecordSink: Send + Sync {
    fn write_trades(
        &self,
        instrument: &InstrumentId,
        stamp: &PartitionStamp,
        rows: &[TradeRecord],
    ) -> SinkResult<()>;

    fn write_ticks(
        &self,
        instrument: &InstrumentId,
        stamp: &PartitionStamp,
        rows: &[TickRecord],
    ) -> SinkResult<()>;

    fn write_snapshots(
        &self,
        instrument: &InstrumentId,
        stamp: &PartitionStamp,
        rows: &[SnapshotRecord],
    ) -> SinkResult<()>;
}
