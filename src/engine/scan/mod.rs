pub mod batch;
pub mod metrics;
pub mod queue;
pub mod reader;

pub use batch::{BatchingReader, rows_to_record_batch};
pub use metrics::ScanMetrics;
pub use queue::{OfferOutcome, QueueItem, ScanQueue, ScanReceiver, ScanSender};
pub use reader::{
    PartitionReader, ReaderSettings, ReaderState, ShardReaderFactory, StreamingShardReader,
};

#[cfg(test)]
mod reader_test;
