//! Shared types for the polyrec market data recorder.
//!
//! Defines instrument identities, the three record kinds (trades, ticks,
//! book snapshots) and the sink contract buffers flush through.

pub mod error;
pub mod instrument;
pub mod record;
pub mod sink;

pub use error::{SinkError, SinkResult};
pub use instrument::{Instrument, InstrumentId, OutcomeToken, TokenId};
pub use record::{SnapshotRecord, TickRecord, TradeRecord};
pub use sink::{PartitionStamp, RecordSink};
