use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::metrics::ScanMetrics;
use super::queue::{OfferOutcome, QueueItem, ScanQueue, ScanReceiver, ScanSender};
use crate::driver::{Connector, DriverRegistry, StoreClientFactory};
use crate::engine::errors::{ScanError, SchemaDrift, StoreError};
use crate::engine::plan::{KeyRange, ShardPartition};
use crate::engine::types::{ScalarValue, to_engine};
use crate::shared::config::{CONFIG, ScanConfig};
use crate::store::{ReadStream, ReadTableRequest, ResultBlock, Session, Status, StatusCode};

const LOG_TARGET: &str = "kvscan::scan::reader";

/// What the engine drives per partition.
pub trait PartitionReader: Send {
    /// Advances to the next row; `false` once the partition is exhausted.
    fn next(&mut self) -> Result<bool, ScanError>;

    /// The current row in output column order.
    fn get(&self) -> Result<Vec<ScalarValue>, ScanError>;

    /// Releases everything the reader holds. Safe in any state.
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Created,
    Prepared,
    Finished,
    Failed,
}

/// Timing knobs of a reader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderSettings {
    /// How often blocked queue offers and takes wake up.
    pub poll_interval: Duration,
    /// Pause between queue drains while `close` waits for the producer.
    pub drain_pause: Duration,
    pub request_timeout: Duration,
}

impl ReaderSettings {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            drain_pause: Duration::from_millis(config.drain_pause_ms.max(1)),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self::from_config(&CONFIG.scan)
    }
}

#[derive(Debug)]
struct ReaderLatch {
    state: ReaderState,
    first_issue: Option<ScanError>,
}

/// State shared by a reader and its producer thread.
#[derive(Debug)]
pub(super) struct ScanControl {
    latch: Mutex<ReaderLatch>,
    cancelled: AtomicBool,
}

impl ScanControl {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self {
            latch: Mutex::new(ReaderLatch {
                state: ReaderState::Created,
                first_issue: None,
            }),
            cancelled: AtomicBool::new(false),
        })
    }

    pub(super) fn state(&self) -> ReaderState {
        self.latch.lock().state
    }

    fn set_state(&self, state: ReaderState) {
        self.latch.lock().state = state;
    }

    fn finish(&self) {
        let mut latch = self.latch.lock();
        if latch.state != ReaderState::Failed {
            latch.state = ReaderState::Finished;
        }
    }

    /// First writer wins; later issues are dropped.
    pub(super) fn set_issue(&self, issue: ScanError) -> bool {
        let mut latch = self.latch.lock();
        if latch.first_issue.is_some() {
            return false;
        }
        latch.first_issue = Some(issue);
        latch.state = ReaderState::Failed;
        true
    }

    pub(super) fn issue(&self) -> Option<ScanError> {
        self.latch.lock().first_issue.clone()
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Reads one shard of a table through a streaming range read. A producer
/// thread pushes result blocks into a bounded queue; the engine thread pulls
/// rows out of them through [`PartitionReader`].
pub struct StreamingShardReader {
    partition: ShardPartition,
    connector: Arc<Connector>,
    settings: ReaderSettings,
    out_columns: Vec<String>,
    out_indexes: Vec<usize>,
    control: Arc<ScanControl>,
    metrics: Arc<ScanMetrics>,
    receiver: Option<ScanReceiver>,
    session: Option<Arc<dyn Session>>,
    stream: Option<Arc<dyn ReadStream>>,
    worker: Option<JoinHandle<()>>,
    current: Option<ResultBlock>,
    position: Option<usize>,
    rows_read: u64,
}

impl StreamingShardReader {
    pub fn new(partition: ShardPartition, connector: Arc<Connector>) -> Self {
        let out_columns = partition.options().out_columns();
        Self {
            out_indexes: vec![0; out_columns.len()],
            out_columns,
            partition,
            connector,
            settings: ReaderSettings::default(),
            control: ScanControl::new(),
            metrics: ScanMetrics::new(),
            receiver: None,
            session: None,
            stream: None,
            worker: None,
            current: None,
            position: None,
            rows_read: 0,
        }
    }

    pub fn with_settings(mut self, settings: ReaderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn state(&self) -> ReaderState {
        self.control.state()
    }

    pub fn partition(&self) -> &ShardPartition {
        &self.partition
    }

    pub fn out_columns(&self) -> &[String] {
        &self.out_columns
    }

    /// Rows handed out so far. Telemetry only.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn metrics(&self) -> &Arc<ScanMetrics> {
        &self.metrics
    }

    fn table_path(&self) -> &str {
        self.partition.options().table_path()
    }

    /// Opens the session and the range read and starts the producer. Does
    /// nothing unless the reader is freshly created.
    pub fn prepare(&mut self) -> Result<(), ScanError> {
        if self.control.state() != ReaderState::Created {
            return Ok(());
        }
        let options = Arc::clone(self.partition.options());
        let range = self.partition.effective_range();
        debug!(
            target: LOG_TARGET,
            table = %options.table_path(),
            range = %range,
            key_columns = ?options.key_columns(),
            "Configuring shard scan"
        );

        let request = self.build_request(&range);
        let ttl = Duration::from_secs(options.session_seconds());
        let session = match self.connector.create_session(ttl) {
            Ok(session) => session,
            Err(source) => return Err(self.setup_failed(source)),
        };
        let stream = match session.read_table(options.table_path(), request) {
            Ok(stream) => stream,
            Err(source) => {
                session.close();
                return Err(self.setup_failed(source));
            }
        };

        let (sender, receiver) = ScanQueue::bounded(options.queue_depth(), Arc::clone(&self.metrics));
        let producer = Producer {
            table: options.table_path().to_string(),
            range,
            stream: Arc::clone(&stream),
            sender,
            control: Arc::clone(&self.control),
            poll: self.settings.poll_interval,
        };
        self.control.set_state(ReaderState::Prepared);
        let spawned = thread::Builder::new()
            .name(format!("kvscan-read:{}", options.table_name()))
            .spawn(move || producer.run());
        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                self.receiver = Some(receiver);
                self.stream = Some(stream);
                self.session = Some(session);
                self.current = None;
                self.position = None;
                Ok(())
            }
            Err(e) => {
                stream.cancel();
                session.close();
                let status = Status::new(StatusCode::ClientInternalError, e.to_string());
                Err(self.setup_failed(StoreError::new("spawn scan producer", status)))
            }
        }
    }

    fn build_request(&self, range: &KeyRange) -> ReadTableRequest {
        let mut builder = ReadTableRequest::builder()
            .columns(self.out_columns.iter().cloned())
            .ordered(true)
            .request_timeout(self.settings.request_timeout);
        if !range.from().is_unrestricted() {
            builder = builder.from_key(range.from().values().to_vec(), range.from().is_inclusive());
        }
        if !range.to().is_unrestricted() {
            builder = builder.to_key(range.to().values().to_vec(), range.to().is_inclusive());
        }
        if let Some(limit) = self.partition.options().row_limit() {
            debug!(target: LOG_TARGET, limit, "Setting row limit");
            builder = builder.row_limit(limit);
        }
        builder.build()
    }

    fn setup_failed(&self, source: StoreError) -> ScanError {
        warn!(
            target: LOG_TARGET,
            table = %self.table_path(),
            error = %source,
            "Failed to initiate scan"
        );
        let err = ScanError::Setup {
            table: self.table_path().to_string(),
            source,
        };
        self.control.set_issue(err.clone());
        err
    }

    pub fn next(&mut self) -> Result<bool, ScanError> {
        if self.advance_in_block() {
            return Ok(true);
        }
        match self.control.state() {
            ReaderState::Prepared => self.fetch_next(),
            ReaderState::Failed => Err(self.latched_issue()),
            ReaderState::Created => {
                self.prepare()?;
                self.fetch_next()
            }
            ReaderState::Finished => Ok(false),
        }
    }

    fn advance_in_block(&mut self) -> bool {
        let Some(block) = &self.current else {
            return false;
        };
        let next = self.position.map_or(0, |p| p + 1);
        if next < block.row_count() {
            self.position = Some(next);
            self.rows_read += 1;
            true
        } else {
            false
        }
    }

    fn fetch_next(&mut self) -> Result<bool, ScanError> {
        loop {
            if self.advance_in_block() {
                return Ok(true);
            }
            let item = self
                .receiver
                .as_ref()
                .and_then(|rx| rx.take(self.settings.poll_interval));
            match item {
                Some(QueueItem::Block(block)) => {
                    if let Err(drift) = self.rebind(&block) {
                        let err = ScanError::SchemaDrift {
                            table: self.table_path().to_string(),
                            drift,
                        };
                        self.fail(err.clone());
                        return Err(err);
                    }
                    debug!(
                        target: LOG_TARGET,
                        table = %self.table_path(),
                        rows = block.row_count(),
                        "Fetched block from queue"
                    );
                    self.current = Some(block);
                    self.position = None;
                }
                Some(QueueItem::EndOfScan) => {
                    self.current = None;
                    self.position = None;
                    if let Some(issue) = self.control.issue() {
                        return Err(issue);
                    }
                    self.control.finish();
                    debug!(
                        target: LOG_TARGET,
                        table = %self.table_path(),
                        rows = self.rows_read,
                        "No more blocks in queue"
                    );
                    return Ok(false);
                }
                None => {
                    let err = ScanError::ProducerLost(self.table_path().to_string());
                    self.fail(err.clone());
                    return Err(err);
                }
            }
        }
    }

    /// Maps output columns to their positions in `block`. The store may
    /// reorder columns from one block to the next.
    fn rebind(&mut self, block: &ResultBlock) -> Result<(), SchemaDrift> {
        if block.column_count() != self.out_columns.len() {
            return Err(SchemaDrift::ColumnCount {
                expected: self.out_columns.len(),
                got: block.column_count(),
            });
        }
        for (slot, name) in self.out_indexes.iter_mut().zip(&self.out_columns) {
            *slot = block
                .column_index(name)
                .ok_or_else(|| SchemaDrift::LostColumn(name.clone()))?;
        }
        Ok(())
    }

    fn fail(&mut self, err: ScanError) {
        err.log_error();
        self.control.set_issue(err);
        self.control.cancel();
        if let Some(stream) = &self.stream {
            stream.cancel();
        }
        self.current = None;
        self.position = None;
    }

    fn latched_issue(&self) -> ScanError {
        self.control
            .issue()
            .unwrap_or_else(|| ScanError::ProducerLost(self.table_path().to_string()))
    }

    pub fn get(&self) -> Result<Vec<ScalarValue>, ScanError> {
        let (Some(block), Some(row)) = (&self.current, self.position) else {
            return Err(ScanError::NoCurrentRow);
        };
        self.out_indexes
            .iter()
            .map(|&col| {
                block
                    .value(row, col)
                    .map(to_engine)
                    .ok_or(ScanError::NoCurrentRow)
            })
            .collect()
    }

    /// Stops the scan and releases the session. Returns only after the
    /// producer thread has exited.
    pub fn close(&mut self) {
        self.control.finish();
        self.control.cancel();
        if let Some(stream) = self.stream.take() {
            stream.cancel();
        }
        if let Some(worker) = self.worker.take() {
            let mut passes = 0u32;
            while !worker.is_finished() {
                if let Some(receiver) = &self.receiver {
                    receiver.drain();
                }
                thread::sleep(self.settings.drain_pause);
                passes += 1;
            }
            if worker.join().is_err() {
                warn!(target: LOG_TARGET, table = %self.table_path(), "Scan producer panicked");
            }
            debug!(
                target: LOG_TARGET,
                table = %self.table_path(),
                passes,
                "Scan producer stopped"
            );
        }
        if let Some(session) = self.session.take() {
            session.close();
            info!(
                target: LOG_TARGET,
                table = %self.table_path(),
                partition = self.partition.index(),
                rows = self.rows_read,
                "Shard scan closed"
            );
        }
        self.receiver = None;
        self.current = None;
        self.position = None;
    }
}

impl PartitionReader for StreamingShardReader {
    fn next(&mut self) -> Result<bool, ScanError> {
        StreamingShardReader::next(self)
    }

    fn get(&self) -> Result<Vec<ScalarValue>, ScanError> {
        StreamingShardReader::get(self)
    }

    fn close(&mut self) {
        StreamingShardReader::close(self)
    }
}

impl Drop for StreamingShardReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs the range read on its own thread and feeds the queue.
struct Producer {
    table: String,
    range: KeyRange,
    stream: Arc<dyn ReadStream>,
    sender: ScanSender,
    control: Arc<ScanControl>,
    poll: Duration,
}

impl Producer {
    fn run(self) {
        debug!(
            target: LOG_TARGET,
            table = %self.table,
            range = %self.range,
            "Started background scan"
        );
        let mut sink = |block: ResultBlock| {
            let rows = block.row_count();
            match self
                .sender
                .offer(QueueItem::Block(block), &self.control.cancelled, self.poll)
            {
                OfferOutcome::Sent => {
                    debug!(target: LOG_TARGET, table = %self.table, rows, "Queued block");
                    ControlFlow::Continue(())
                }
                OfferOutcome::Cancelled | OfferOutcome::Disconnected => ControlFlow::Break(()),
            }
        };
        let status = self.stream.start(&mut sink);
        self.complete(status);

        let marker = self
            .sender
            .offer(QueueItem::EndOfScan, &self.control.cancelled, self.poll);
        if marker != OfferOutcome::Sent {
            debug!(target: LOG_TARGET, table = %self.table, ?marker, "End-of-scan marker not queued");
        }
        debug!(
            target: LOG_TARGET,
            table = %self.table,
            range = %self.range,
            "Completed background scan"
        );
    }

    fn complete(&self, status: Status) {
        if status.is_success() {
            return;
        }
        if status.is_cancelled() || self.control.is_cancelled() {
            debug!(target: LOG_TARGET, table = %self.table, %status, "Scan stream stopped");
            return;
        }
        warn!(
            target: LOG_TARGET,
            table = %self.table,
            range = %self.range,
            %status,
            "Background scan failed"
        );
        let message = format!(
            "Background scan failed for table {}, range {}",
            self.table, self.range
        );
        self.control.set_issue(ScanError::failed(message, status));
    }
}

/// Creates readers for planned partitions, re-acquiring the driver handle
/// from the registry by the partition's connection options.
pub struct ShardReaderFactory {
    registry: Arc<DriverRegistry>,
    clients: Arc<dyn StoreClientFactory>,
    settings: ReaderSettings,
}

impl ShardReaderFactory {
    pub fn new(clients: Arc<dyn StoreClientFactory>) -> Self {
        Self {
            registry: DriverRegistry::global(),
            clients,
            settings: ReaderSettings::default(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<DriverRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_settings(mut self, settings: ReaderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn create_reader(&self, partition: ShardPartition) -> Result<StreamingShardReader, ScanError> {
        let connector = self
            .registry
            .get_or_create(partition.options().connection(), self.clients.as_ref())
            .map_err(|source| ScanError::Setup {
                table: partition.options().table_path().to_string(),
                source,
            })?;
        Ok(StreamingShardReader::new(partition, connector).with_settings(self.settings.clone()))
    }
}
