use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one reader's producer/consumer queue. Blocks and rows only
/// count result blocks; `pending` counts every queued item including the
/// end-of-scan marker. The peak is sampled from the channel itself after
/// each send, so it never exceeds the queue capacity.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    total_sent_blocks: AtomicU64,
    total_sent_rows: AtomicU64,
    total_received_blocks: AtomicU64,
    total_received_rows: AtomicU64,
    discarded_items: AtomicU64,
    pending_items: AtomicU64,
    backpressure_events: AtomicU64,
    peak_pending: AtomicU64,
}

impl ScanMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_send_success(&self, rows: u64, queued: usize) {
        self.total_sent_blocks.fetch_add(1, Ordering::Relaxed);
        self.total_sent_rows.fetch_add(rows, Ordering::Relaxed);
        self.pending_items.fetch_add(1, Ordering::Relaxed);
        self.observe_depth(queued as u64);
    }

    pub fn on_marker_sent(&self, queued: usize) {
        self.pending_items.fetch_add(1, Ordering::Relaxed);
        self.observe_depth(queued as u64);
    }

    pub fn record_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_receive(&self, rows: u64) {
        self.total_received_blocks.fetch_add(1, Ordering::Relaxed);
        self.total_received_rows.fetch_add(rows, Ordering::Relaxed);
        self.pending_dec();
    }

    pub fn on_marker_received(&self) {
        self.pending_dec();
    }

    pub fn on_discard(&self) {
        self.discarded_items.fetch_add(1, Ordering::Relaxed);
        self.pending_dec();
    }

    pub fn total_sent_rows(&self) -> u64 {
        self.total_sent_rows.load(Ordering::Relaxed)
    }

    pub fn total_received_rows(&self) -> u64 {
        self.total_received_rows.load(Ordering::Relaxed)
    }

    pub fn total_sent_blocks(&self) -> u64 {
        self.total_sent_blocks.load(Ordering::Relaxed)
    }

    pub fn total_received_blocks(&self) -> u64 {
        self.total_received_blocks.load(Ordering::Relaxed)
    }

    pub fn discarded_items(&self) -> u64 {
        self.discarded_items.load(Ordering::Relaxed)
    }

    pub fn pending_items(&self) -> u64 {
        self.pending_items.load(Ordering::Relaxed)
    }

    pub fn peak_pending_items(&self) -> u64 {
        self.peak_pending.load(Ordering::Relaxed)
    }

    pub fn backpressure_events(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }

    fn observe_depth(&self, queued: u64) {
        loop {
            let current_peak = self.peak_pending.load(Ordering::Relaxed);
            if queued <= current_peak {
                break;
            }
            if self
                .peak_pending
                .compare_exchange(current_peak, queued, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    fn pending_dec(&self) {
        self.pending_items.fetch_sub(1, Ordering::Relaxed);
    }
}
