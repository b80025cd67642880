//! Hour-partitioned Parquet sink.
//!
//! Layout: `<data_dir>/<asset_class>/<timeframe>/<slug>/<YYYY-MM-DD>/<HH_00>_<kind>.parquet`,
//! one file per record kind per UTC hour. Re-flushing into an existing hour
//! concatenates: the old file is read fully, then rewritten with the old rows
//! followed by the new ones. An unreadable old file is overwritten so one
//! corrupt hour never wedges recording.

use crate::error::{PersistenceError, PersistenceResult};
use arrow::array::{ArrayRef, Float64Array, RecordBatch, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use polyrec_core::{
    InstrumentId, PartitionStamp, RecordSink, SinkResult, SnapshotRecord, TickRecord, TradeRecord,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const UTC: &str = "UTC";

/// Parquet-backed `RecordSink`.
///
/// Stateless between calls: every write resolves its partition path from the
/// stamp, so hour and date rollover need no rotation bookkeeping here.
pub struct ParquetSink {
    data_dir: PathBuf,
}

impl ParquetSink {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// `<data_dir>/<asset_class>/<timeframe>/<slug>/<date>/<hour>_<kind>.parquet`
    fn file_path(&self, instrument: &InstrumentId, stamp: &PartitionStamp, kind: &str) -> PathBuf {
        self.data_dir
            .join(&instrument.asset_class)
            .join(&instrument.timeframe)
            .join(&instrument.slug)
            .join(&stamp.date)
            .join(format!("{}_{}.parquet", stamp.hour, kind))
    }

    /// Write a batch into its hour file, concatenating with existing rows.
    ///
    /// The existing file is read to completion before `File::create`
    /// truncates it, so the old rows are either fully carried over or (when
    /// unreadable) knowingly discarded.
    fn merge_write(&self, path: &Path, schema: SchemaRef, batch: RecordBatch) -> PersistenceResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let existing = if path.exists() {
            read_batches(path)
        } else {
            Vec::new()
        };

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        for old in &existing {
            writer.write(old)?;
        }
        writer.write(&batch)?;
        writer.close()?;

        debug!(
            path = %path.display(),
            carried = existing.iter().map(|b| b.num_rows()).sum::<usize>(),
            appended = batch.num_rows(),
            "Hour file written"
        );
        Ok(())
    }
}

impl RecordSink for ParquetSink {
    fn write_trades(
        &self,
        instrument: &InstrumentId,
        stamp: &PartitionStamp,
        rows: &[TradeRecord],
    ) -> SinkResult<()> {
        let path = self.file_path(instrument, stamp, "trades");
        let batch = trades_batch(rows).map_err(PersistenceError::from)?;
        self.merge_write(&path, batch.schema(), batch)
            .map_err(Into::into)
    }

    fn write_ticks(
        &self,
        instrument: &InstrumentId,
        stamp: &PartitionStamp,
        rows: &[TickRecord],
    ) -> SinkResult<()> {
        let path = self.file_path(instrument, stamp, "ticks");
        let batch = ticks_batch(rows).map_err(PersistenceError::from)?;
        self.merge_write(&path, batch.schema(), batch)
            .map_err(Into::into)
    }

    fn write_snapshots(
        &self,
        instrument: &InstrumentId,
        stamp: &PartitionStamp,
        rows: &[SnapshotRecord],
    ) -> SinkResult<()> {
        let path = self.file_path(instrument, stamp, "snapshots");
        let batch = snapshots_batch(rows).map_err(PersistenceError::from)?;
        self.merge_write(&path, batch.schema(), batch)
            .map_err(Into::into)
    }
}

/// Read every batch of an existing hour file. Any failure falls back to an
/// empty result (overwrite semantics) after logging.
fn read_batches(path: &Path) -> Vec<RecordBatch> {
    let read = || -> PersistenceResult<Vec<RecordBatch>> {
        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        Ok(batches)
    };

    match read() {
        Ok(batches) => batches,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Existing hour file unreadable, overwriting");
            Vec::new()
        }
    }
}

fn timestamp_field() -> Field {
    Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Millisecond, Some(UTC.into())),
        false,
    )
}

fn trades_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        timestamp_field(),
        Field::new("market_slug", DataType::Utf8, false),
        Field::new("asset_id", DataType::Utf8, false),
        Field::new("price", DataType::Float64, false),
        Field::new("size", DataType::Float64, false),
        Field::new("side", DataType::Utf8, false),
        Field::new("end_date", DataType::Utf8, false),
    ]))
}

fn ticks_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        timestamp_field(),
        Field::new("market_slug", DataType::Utf8, false),
        Field::new("asset_id", DataType::Utf8, false),
        Field::new("price", DataType::Float64, false),
        Field::new("size", DataType::Float64, false),
        Field::new("side", DataType::Utf8, false),
        Field::new("best_bid", DataType::Float64, true),
        Field::new("best_ask", DataType::Float64, true),
    ]))
}

fn snapshots_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        timestamp_field(),
        Field::new("market_slug", DataType::Utf8, false),
        Field::new("asset_id", DataType::Utf8, false),
        Field::new("bids", DataType::Utf8, false),
        Field::new("asks", DataType::Utf8, false),
        Field::new("end_date", DataType::Utf8, false),
    ]))
}

fn timestamps(values: impl Iterator<Item = i64>) -> ArrayRef {
    Arc::new(TimestampMillisecondArray::from(values.collect::<Vec<_>>()).with_timezone(UTC))
}

fn strings<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from(values.collect::<Vec<_>>()))
}

fn floats(values: impl Iterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from(values.collect::<Vec<_>>()))
}

fn optional_floats(values: impl Iterator<Item = Option<f64>>) -> ArrayRef {
    Arc::new(Float64Array::from(values.collect::<Vec<_>>()))
}

fn trades_batch(rows: &[TradeRecord]) -> Result<RecordBatch, arrow::error::ArrowError> {
    RecordBatch::try_new(
        trades_schema(),
        vec![
            timestamps(rows.iter().map(|r| r.timestamp_ms)),
            strings(rows.iter().map(|r| r.market_slug.as_str())),
            strings(rows.iter().map(|r| r.asset_id.as_str())),
            floats(rows.iter().map(|r| r.price)),
            floats(rows.iter().map(|r| r.size)),
            strings(rows.iter().map(|r| r.side.as_str())),
            strings(rows.iter().map(|r| r.end_date.as_str())),
        ],
    )
}

fn ticks_batch(rows: &[TickRecord]) -> Result<RecordBatch, arrow::error::ArrowError> {
    RecordBatch::try_new(
        ticks_schema(),
        vec![
            timestamps(rows.iter().map(|r| r.timestamp_ms)),
            strings(rows.iter().map(|r| r.market_slug.as_str())),
            strings(rows.iter().map(|r| r.asset_id.as_str())),
            floats(rows.iter().map(|r| r.price)),
            floats(rows.iter().map(|r| r.size)),
            strings(rows.iter().map(|r| r.side.as_str())),
            optional_floats(rows.iter().map(|r| r.best_bid)),
            optional_floats(rows.iter().map(|r| r.best_ask)),
        ],
    )
}

fn snapshots_batch(rows: &[SnapshotRecord]) -> Result<RecordBatch, arrow::error::ArrowError> {
    RecordBatch::try_new(
        snapshots_schema(),
        vec![
            timestamps(rows.iter().map(|r| r.timestamp_ms)),
            strings(rows.iter().map(|r| r.market_slug.as_str())),
            strings(rows.iter().map(|r| r.asset_id.as_str())),
            strings(rows.iter().map(|r| r.bids.as_str())),
            strings(rows.iter().map(|r| r.asks.as_str())),
            strings(rows.iter().map(|r| r.end_date.as_str())),
        ],
    )
}
