use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, SendTimeoutError, TrySendError};

use super::metrics::ScanMetrics;
use crate::store::ResultBlock;

/// What travels from a shard's producer to its reader.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Block(ResultBlock),
    /// Always the last item a producer enqueues, whatever the outcome.
    EndOfScan,
}

impl QueueItem {
    fn rows(&self) -> Option<u64> {
        match self {
            QueueItem::Block(block) => Some(block.row_count() as u64),
            QueueItem::EndOfScan => None,
        }
    }
}

/// How a blocking offer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Sent,
    /// The cancel token was raised while the queue stayed full.
    Cancelled,
    /// The receiving half is gone.
    Disconnected,
}

pub struct ScanSender {
    inner: channel::Sender<QueueItem>,
    metrics: Arc<ScanMetrics>,
}

impl ScanSender {
    /// Blocks until the item is queued. While the queue is full the cancel
    /// token is re-checked every `poll`.
    pub fn offer(&self, item: QueueItem, cancel: &AtomicBool, poll: Duration) -> OfferOutcome {
        let mut item = match self.try_offer(item) {
            Ok(()) => return OfferOutcome::Sent,
            Err(TrySendError::Full(item)) => item,
            Err(TrySendError::Disconnected(_)) => return OfferOutcome::Disconnected,
        };
        loop {
            if cancel.load(Ordering::Acquire) {
                return OfferOutcome::Cancelled;
            }
            let rows = item.rows();
            match self.inner.send_timeout(item, poll) {
                Ok(()) => {
                    self.account(rows);
                    return OfferOutcome::Sent;
                }
                Err(SendTimeoutError::Timeout(back)) => item = back,
                Err(SendTimeoutError::Disconnected(_)) => return OfferOutcome::Disconnected,
            }
        }
    }

    pub fn try_offer(&self, item: QueueItem) -> Result<(), TrySendError<QueueItem>> {
        let rows = item.rows();
        match self.inner.try_send(item) {
            Ok(()) => {
                self.account(rows);
                Ok(())
            }
            Err(TrySendError::Full(item)) => {
                self.metrics.record_backpressure();
                Err(TrySendError::Full(item))
            }
            Err(err) => Err(err),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().unwrap_or(0)
    }

    fn account(&self, rows: Option<u64>) {
        let queued = self.inner.len();
        match rows {
            Some(rows) => self.metrics.on_send_success(rows, queued),
            None => self.metrics.on_marker_sent(queued),
        }
    }
}

pub struct ScanReceiver {
    inner: channel::Receiver<QueueItem>,
    metrics: Arc<ScanMetrics>,
}

impl ScanReceiver {
    /// Waits for the next item, retrying every `poll`. `None` means the
    /// producer dropped its half without anything left queued.
    pub fn take(&self, poll: Duration) -> Option<QueueItem> {
        loop {
            match self.inner.recv_timeout(poll) {
                Ok(item) => {
                    self.account(&item);
                    return Some(item);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    pub fn try_take(&self) -> Option<QueueItem> {
        let item = self.inner.try_recv().ok()?;
        self.account(&item);
        Some(item)
    }

    /// Discards everything currently queued, returning how many items went.
    pub fn drain(&self) -> usize {
        let mut dropped = 0;
        while self.inner.try_recv().is_ok() {
            self.metrics.on_discard();
            dropped += 1;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn account(&self, item: &QueueItem) {
        match item.rows() {
            Some(rows) => self.metrics.on_receive(rows),
            None => self.metrics.on_marker_received(),
        }
    }
}

pub struct ScanQueue;

impl ScanQueue {
    pub fn bounded(capacity: usize, metrics: Arc<ScanMetrics>) -> (ScanSender, ScanReceiver) {
        let (tx, rx) = channel::bounded(capacity);

        (
            ScanSender {
                inner: tx,
                metrics: Arc::clone(&metrics),
            },
            ScanReceiver { inner: rx, metrics },
        )
    }
}
