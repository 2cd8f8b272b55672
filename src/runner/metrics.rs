use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Real-time metrics for a job run.
///
/// The runner updates these counters during execution; callers can snapshot
/// them at any time, including from another thread while the job is running.
pub struct ExecutionMetrics {
    elapsed_ns: AtomicU64,

    rows_processed: AtomicU64,
    batches_started: AtomicU64,
    batches_finished: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_batches: AtomicUsize,
    max_active_batches: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            elapsed_ns: AtomicU64::new(0),
            rows_processed: AtomicU64::new(0),
            batches_started: AtomicU64::new(0),
            batches_finished: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_batches: AtomicUsize::new(0),
            max_active_batches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub(crate) fn on_rows_processed(&self, count: u64) {
        let _ = self.rows_processed.fetch_add(count, Ordering::SeqCst);
    }

    pub(crate) fn on_batch_start(&self) {
        let _ = self.batches_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_batches.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_batches, now);
    }

    pub(crate) fn on_batch_end(&self) {
        let _ = self.batches_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_batches.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn on_throttle_wait(&self, d: Duration) {
        let add = d.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.throttle_wait_ns.fetch_add(add, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        ExecutionMetricsSnapshot {
            elapsed,
            rows_processed: self.rows_processed.load(Ordering::SeqCst),
            batches_started: self.batches_started.load(Ordering::SeqCst),
            batches_finished: self.batches_finished.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_batches: self.max_active_batches.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    loop {
        let cur = dst.load(Ordering::SeqCst);
        if now <= cur {
            break;
        }
        if dst
            .compare_exchange(cur, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub elapsed: Option<Duration>,
    pub rows_processed: u64,
    pub batches_started: u64,
    pub batches_finished: u64,
    pub throttle_wait: Duration,
    pub max_active_batches: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows_processed={}, batches={}/{}, max_active_batches={}, throttle_wait={:?}, elapsed={:?}",
            self.rows_processed,
            self.batches_finished,
            self.batches_started,
            self.max_active_batches,
            self.throttle_wait,
            self.elapsed
        )
    }
}
