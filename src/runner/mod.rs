//! The task runner: executes a compiled [`AnalysisJob`] single- or
//! multi-threaded.
//!
//! Multi-threaded execution fetches rows from the source in super-chunks
//! several permit-windows deep, splits them into fixed-size batches and hands
//! all of them to a rayon pool at once; a counting semaphore then bounds how
//! many batches actually process concurrently. Fetching only ever happens on
//! the driving thread, at chunk boundaries; cancellation and timeout are also
//! checked there, so a running batch is never interrupted mid-row.

mod consume;
mod listener;
mod metrics;
mod semaphore;

pub use listener::{
    progress_percent, AnalysisListener, CompositeListener, Progress, StdErrAnalysisListener,
};
pub use metrics::{ExecutionMetrics, ExecutionMetricsSnapshot};

/// Super-chunks are this many permit-windows of rows deep.
const FETCH_AHEAD_FACTOR: usize = 4;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::component::ExecutionContext;
use crate::error::{ExecutionError, ExecutionResult};
use crate::job::{AnalysisJob, ConsumerChain};
use crate::result::annotation::DEFAULT_SAMPLE_CAP;
use crate::result::{AnalysisResult, AnalyzerResult, RowAnnotationFactory};
use crate::runner::consume::ConsumeRowHandler;
use crate::runner::semaphore::Semaphore;
use crate::source::{QueryConstraints, RowStream};
use crate::types::InputRow;

/// How rows are dispatched to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Process every row on the calling thread, in source order.
    SingleThreaded,
    /// Process row batches on a rayon pool. `num_threads: None` sizes the pool
    /// to the number of available CPUs.
    MultiThreaded { num_threads: Option<usize> },
}

/// One partition of a partitioned (distributed-style) run: this worker
/// processes the `index`-th of `of` contiguous row ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Zero-based partition index.
    pub index: usize,
    /// Total number of partitions.
    pub of: usize,
}

/// A shared flag for cooperatively cancelling a running job.
///
/// Cancellation is checked at fetch boundaries; rows already dispatched finish
/// processing, then the run stops with [`ExecutionError::Cancelled`] and every
/// component is closed.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; callable from any thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Execution options for an [`AnalysisRunner`].
#[derive(Clone)]
pub struct RunOptions {
    /// Dispatch mode.
    pub mode: ExecutionMode,
    /// Rows per batch under multi-threaded execution.
    pub batch_size: usize,
    /// Bound on concurrently processed batches (backpressure).
    pub max_in_flight_batches: usize,
    /// Abort the run if it has not finished within this duration.
    pub timeout: Option<Duration>,
    /// Sample cap for row annotations created during this run.
    pub annotation_sample_cap: usize,
    /// Listener notified of execution events.
    pub listener: Option<Arc<dyn AnalysisListener>>,
    /// Named shared reference data, exposed to components at initialize time.
    pub reference_data: Vec<(String, Arc<dyn Any + Send + Sync>)>,
    /// Restrict this run to one contiguous row-range partition of each source.
    pub partition: Option<Partition>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::MultiThreaded { num_threads: None },
            batch_size: 4096,
            max_in_flight_batches: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            timeout: None,
            annotation_sample_cap: DEFAULT_SAMPLE_CAP,
            listener: None,
            reference_data: Vec::new(),
            partition: None,
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("mode", &self.mode)
            .field("batch_size", &self.batch_size)
            .field("max_in_flight_batches", &self.max_in_flight_batches)
            .field("timeout", &self.timeout)
            .field("annotation_sample_cap", &self.annotation_sample_cap)
            .field("listener", &self.listener.is_some())
            .field(
                "reference_data",
                &self
                    .reference_data
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("partition", &self.partition)
            .finish()
    }
}

/// Executes compiled jobs.
pub struct AnalysisRunner {
    options: RunOptions,
    metrics: ExecutionMetrics,
}

impl AnalysisRunner {
    /// Create a runner with the given options.
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            metrics: ExecutionMetrics::new(),
        }
    }

    /// Live metrics of this runner's current (or last) run.
    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }

    /// Run `job` to completion.
    pub fn run(&self, job: &AnalysisJob) -> ExecutionResult<AnalysisResult> {
        self.run_with_token(job, &CancellationToken::new())
    }

    /// Run `job` to completion, honoring `token` for cooperative cancellation.
    pub fn run_with_token(
        &self,
        job: &AnalysisJob,
        token: &CancellationToken,
    ) -> ExecutionResult<AnalysisResult> {
        let started_at = SystemTime::now();
        let start = Instant::now();
        let deadline = self.options.timeout.map(|timeout| start + timeout);

        if let Some(listener) = &self.options.listener {
            listener.on_job_start();
        }

        let outcome = self.execute(job, token, deadline, started_at);
        self.metrics.end_run(start.elapsed());

        match outcome {
            Ok(result) => {
                if let Some(listener) = &self.options.listener {
                    listener.on_job_success(&result);
                }
                Ok(result)
            }
            Err(error) => {
                if let Some(listener) = &self.options.listener {
                    listener.on_job_failure(&error);
                }
                Err(error)
            }
        }
    }

    fn execute(
        &self,
        job: &AnalysisJob,
        token: &CancellationToken,
        deadline: Option<Instant>,
        started_at: SystemTime,
    ) -> ExecutionResult<AnalysisResult> {
        let mut error_counts: BTreeMap<String, u64> = BTreeMap::new();
        for chain in job.chains() {
            let chain_errors = self.run_chain(chain, token, deadline)?;
            for (component, count) in chain_errors {
                *error_counts.entry(component).or_insert(0) += count;
            }
        }

        let mut results: BTreeMap<_, Box<dyn AnalyzerResult>> = BTreeMap::new();
        for (handle, _, analyzer) in job.analyzers() {
            results.insert(handle, analyzer.result());
        }

        Ok(AnalysisResult::new(
            results,
            error_counts,
            started_at,
            SystemTime::now(),
        ))
    }

    /// Run one consumer chain end to end. Components are closed in reverse
    /// chain order on every exit path once initialization has happened.
    fn run_chain(
        &self,
        chain: &ConsumerChain,
        token: &CancellationToken,
        deadline: Option<Instant>,
    ) -> ExecutionResult<BTreeMap<String, u64>> {
        let constraints = self.effective_constraints(chain)?;

        for consumer in chain.consumers() {
            consumer
                .instance()
                .as_component()
                .validate()
                .map_err(|error| ExecutionError::InvalidComponent {
                    component: consumer.label().to_string(),
                    message: error.message,
                })?;
        }

        let mut ctx = ExecutionContext::new(RowAnnotationFactory::new(
            self.options.annotation_sample_cap,
        ));
        for (name, data) in &self.options.reference_data {
            ctx = ctx.with_reference_data(name.clone(), Arc::clone(data));
        }

        for consumer in chain.consumers() {
            consumer.instance().as_component().initialize(&ctx);
        }

        let handler = ConsumeRowHandler::new(chain, self.options.listener.as_ref());
        let total = expected_row_total(chain, &constraints);
        let outcome = match chain.source().open(&constraints) {
            Ok(stream) => match self.options.mode {
                ExecutionMode::SingleThreaded => {
                    self.process_single(chain, stream, &handler, token, deadline, total)
                }
                ExecutionMode::MultiThreaded { num_threads } => {
                    self.process_multi(chain, stream, &handler, token, deadline, num_threads, total)
                }
            },
            Err(error) => Err(ExecutionError::SourceRead {
                table: chain.source().table_name().to_string(),
                source: error,
            }),
        };

        for consumer in chain.consumers().iter().rev() {
            consumer.instance().as_component().close();
        }

        outcome?;
        Ok(handler.error_counts())
    }

    /// The chain's compiled constraints, narrowed to this run's partition
    /// window if one is configured.
    fn effective_constraints(&self, chain: &ConsumerChain) -> ExecutionResult<QueryConstraints> {
        let mut constraints = chain.constraints().clone();
        let Some(partition) = self.options.partition else {
            return Ok(constraints);
        };

        let total = chain
            .source()
            .row_count_hint()
            .ok_or_else(|| ExecutionError::Reduce {
                component: "*".to_string(),
                message: format!(
                    "source '{}' reports no row count; cannot run partitioned",
                    chain.source().table_name()
                ),
            })?;

        let of = partition.of.max(1);
        let index = partition.index.min(of - 1);
        let start = index * total / of;
        let end = (index + 1) * total / of;
        let window = end - start;

        constraints.max_rows = Some(match constraints.max_rows {
            Some(max) => window.min(max.saturating_sub(start)),
            None => window,
        });
        constraints.offset += start;
        Ok(constraints)
    }

    fn process_single(
        &self,
        chain: &ConsumerChain,
        mut stream: Box<dyn RowStream>,
        handler: &ConsumeRowHandler<'_>,
        token: &CancellationToken,
        deadline: Option<Instant>,
        total: Option<u64>,
    ) -> ExecutionResult<()> {
        let mut processed = 0u64;
        loop {
            self.check_interrupts(token, deadline)?;
            let Some(values) = self.next_row(chain, stream.as_mut())? else {
                break;
            };
            let mut row = InputRow::new(processed, values, chain.virtual_slot_count());
            handler.consume_row(&mut row)?;
            processed += 1;
            self.metrics.on_rows_processed(1);
            if let Some(listener) = &self.options.listener {
                listener.on_rows_processed(Progress { processed, total }, &row);
            }
        }
        Ok(())
    }

    fn process_multi(
        &self,
        chain: &ConsumerChain,
        mut stream: Box<dyn RowStream>,
        handler: &ConsumeRowHandler<'_>,
        token: &CancellationToken,
        deadline: Option<Instant>,
        num_threads: Option<usize>,
        total: Option<u64>,
    ) -> ExecutionResult<()> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads.unwrap_or(0))
            .build()
            .expect("failed to build rayon thread pool");

        let batch_size = self.options.batch_size.max(1);
        let in_flight = self.options.max_in_flight_batches.max(1);
        let semaphore = Semaphore::new(in_flight);
        // Each super-chunk holds more batches than the semaphore has permits,
        // so the semaphore is what bounds concurrent batches, not the fetch.
        let window = batch_size * in_flight * FETCH_AHEAD_FACTOR;

        let mut processed = 0u64;
        loop {
            self.check_interrupts(token, deadline)?;

            // Fetching stays on this thread; workers never touch the stream.
            let mut fetched = Vec::with_capacity(window);
            while fetched.len() < window {
                let Some(values) = self.next_row(chain, stream.as_mut())? else {
                    break;
                };
                fetched.push(InputRow::new(
                    processed + fetched.len() as u64,
                    values,
                    chain.virtual_slot_count(),
                ));
            }
            if fetched.is_empty() {
                break;
            }

            let mut batches: Vec<Vec<InputRow>> = Vec::new();
            let mut rest = fetched;
            while rest.len() > batch_size {
                let tail = rest.split_off(batch_size);
                batches.push(rest);
                rest = tail;
            }
            batches.push(rest);

            pool.install(|| {
                batches.par_iter_mut().try_for_each(|batch| {
                    let waited = semaphore.acquire();
                    if !waited.is_zero() {
                        self.metrics.on_throttle_wait(waited);
                    }
                    self.metrics.on_batch_start();
                    let outcome = batch
                        .iter_mut()
                        .try_for_each(|row| handler.consume_row(row));
                    self.metrics.on_batch_end();
                    semaphore.release();
                    outcome
                })
            })?;

            let chunk_rows: u64 = batches.iter().map(|b| b.len() as u64).sum();
            processed += chunk_rows;
            self.metrics.on_rows_processed(chunk_rows);
            if let Some(listener) = &self.options.listener {
                if let Some(last) = batches.last().and_then(|b| b.last()) {
                    listener.on_rows_processed(Progress { processed, total }, last);
                }
            }
        }
        Ok(())
    }

    fn next_row(
        &self,
        chain: &ConsumerChain,
        stream: &mut dyn RowStream,
    ) -> ExecutionResult<Option<Vec<crate::types::Value>>> {
        stream
            .next_row()
            .map_err(|error| ExecutionError::SourceRead {
                table: chain.source().table_name().to_string(),
                source: error,
            })
    }

    fn check_interrupts(
        &self,
        token: &CancellationToken,
        deadline: Option<Instant>,
    ) -> ExecutionResult<()> {
        if token.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(ExecutionError::Timeout {
                    after: self.options.timeout.unwrap_or_default(),
                });
            }
        }
        Ok(())
    }
}

/// Rows this chain is expected to see under `constraints`, for progress
/// reporting. `None` when the source reports no row count and no limit was
/// pushed down; an upper bound when equality predicates were pushed down.
fn expected_row_total(chain: &ConsumerChain, constraints: &QueryConstraints) -> Option<u64> {
    let remaining = chain
        .source()
        .row_count_hint()
        .map(|hint| hint.saturating_sub(constraints.offset));
    match (remaining, constraints.max_rows) {
        (Some(remaining), Some(max)) => Some(remaining.min(max) as u64),
        (Some(remaining), None) => Some(remaining as u64),
        (None, Some(max)) => Some(max as u64),
        (None, None) => None,
    }
}
