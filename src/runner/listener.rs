use std::fmt;
use std::sync::Arc;

use crate::error::{ExecutionError, ProcessingError};
use crate::result::AnalysisResult;
use crate::types::InputRow;

/// Row-processed progress of one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Rows processed so far.
    pub processed: u64,
    /// Expected total, when the source reports a row count. An upper bound if
    /// equality predicates were pushed into the source query.
    pub total: Option<u64>,
}

impl Progress {
    /// Percentage complete, when a total is known.
    pub fn percent(&self) -> Option<u8> {
        self.total
            .map(|total| progress_percent(self.processed, total))
    }
}

/// Observer hook for job execution events.
///
/// All callbacks default to no-ops so implementors can pick the events they
/// care about. Callbacks may arrive from worker threads.
pub trait AnalysisListener: Send + Sync {
    /// Called once, before any row source is opened.
    fn on_job_start(&self) {}

    /// Row-processed progress for the current chain, plus the most recently
    /// processed row.
    fn on_rows_processed(&self, _progress: Progress, _row: &InputRow) {}

    /// A component failed on one row. Non-fatal failures are reported here as
    /// they happen and aggregated into per-component counts in the final
    /// result; they are not individually retried.
    fn on_component_error(&self, _component: &str, _error: &ProcessingError) {}

    /// The job finished and produced a result.
    fn on_job_success(&self, _result: &AnalysisResult) {}

    /// The job failed fatally.
    fn on_job_failure(&self, _error: &ExecutionError) {}
}

/// A listener that fans out callbacks to a list of listeners.
#[derive(Default)]
pub struct CompositeListener {
    listeners: Vec<Arc<dyn AnalysisListener>>,
}

impl CompositeListener {
    /// Create a composite from a list of listeners.
    pub fn new(listeners: Vec<Arc<dyn AnalysisListener>>) -> Self {
        Self { listeners }
    }
}

impl fmt::Debug for CompositeListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeListener")
            .field("listeners_len", &self.listeners.len())
            .finish()
    }
}

impl AnalysisListener for CompositeListener {
    fn on_job_start(&self) {
        for l in &self.listeners {
            l.on_job_start();
        }
    }

    fn on_rows_processed(&self, progress: Progress, row: &InputRow) {
        for l in &self.listeners {
            l.on_rows_processed(progress, row);
        }
    }

    fn on_component_error(&self, component: &str, error: &ProcessingError) {
        for l in &self.listeners {
            l.on_component_error(component, error);
        }
    }

    fn on_job_success(&self, result: &AnalysisResult) {
        for l in &self.listeners {
            l.on_job_success(result);
        }
    }

    fn on_job_failure(&self, error: &ExecutionError) {
        for l in &self.listeners {
            l.on_job_failure(error);
        }
    }
}

/// Logs execution events to stderr.
#[derive(Debug, Default)]
pub struct StdErrAnalysisListener;

impl AnalysisListener for StdErrAnalysisListener {
    fn on_job_start(&self) {
        eprintln!("[job] started");
    }

    fn on_rows_processed(&self, progress: Progress, row: &InputRow) {
        match progress.percent() {
            Some(percent) => eprintln!(
                "[job] processed={} ({percent}%) last_row={}",
                progress.processed,
                row.id()
            ),
            None => eprintln!("[job] processed={} last_row={}", progress.processed, row.id()),
        }
    }

    fn on_component_error(&self, component: &str, error: &ProcessingError) {
        eprintln!("[job][error] component={component} err={error}");
    }

    fn on_job_success(&self, result: &AnalysisResult) {
        eprintln!("[job][ok] results={}", result.results().len());
    }

    fn on_job_failure(&self, error: &ExecutionError) {
        eprintln!("[job][failed] err={error}");
    }
}

/// Progress percentage as an integer in `0..=100`.
///
/// `total == 0` reports 100 immediately; anything else is
/// `min(100, 100 * processed / total)`.
pub fn progress_percent(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (processed as u128 * 100) / total as u128;
    percent.min(100) as u8
}
