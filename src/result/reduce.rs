//! Merging partial analyzer results from distributed (partitioned) runs.

use std::collections::BTreeMap;
use std::time::SystemTime;

use thiserror::Error;

use crate::error::{ExecutionError, ExecutionResult};
use crate::job::AnalysisJob;
use crate::result::{AnalysisResult, AnalyzerResult};
use crate::runner::{AnalysisRunner, Partition, RunOptions};

/// Error produced by a [`Reducer`] when partials cannot be merged (e.g. they
/// are of an incompatible shape).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ReduceFailure {
    /// Human-readable cause.
    pub message: String,
}

impl ReduceFailure {
    /// Create a reduce failure from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Merges a non-empty collection of partial [`AnalyzerResult`]s for one
/// component identity into a single result.
///
/// A reducer is bound per analyzer type (via
/// [`Analyzer::reducer`](crate::component::Analyzer::reducer)); an analyzer
/// without one cannot take part in distributed execution.
pub trait Reducer: Send + Sync {
    /// Merge `partials` into one result. `partials` is never empty.
    fn reduce(&self, partials: &[&dyn AnalyzerResult]) -> Result<Box<dyn AnalyzerResult>, ReduceFailure>;
}

/// Downcast one partial to the reducer's concrete result type.
pub(crate) fn downcast_partial<'a, T: 'static>(
    partial: &'a dyn AnalyzerResult,
    expected: &str,
) -> Result<&'a T, ReduceFailure> {
    partial.as_any().downcast_ref::<T>().ok_or_else(|| {
        ReduceFailure::new(format!("partial result is not a {expected}: {partial:?}"))
    })
}

/// Merge the partial results of N runs of `job` into a single
/// [`AnalysisResult`].
///
/// Every analyzer in the job must have a result in every partial and a bound
/// reducer; otherwise this fails with [`ExecutionError::Reduce`] before
/// returning any result. Per-component error counts sum; the wall-clock window
/// spans all partial runs.
pub fn reduce_results(
    job: &AnalysisJob,
    partials: &[AnalysisResult],
) -> ExecutionResult<AnalysisResult> {
    if partials.is_empty() {
        return Err(ExecutionError::Reduce {
            component: "*".to_string(),
            message: "no partial results to reduce".to_string(),
        });
    }

    let mut results: BTreeMap<_, Box<dyn AnalyzerResult>> = BTreeMap::new();
    for (handle, label, analyzer) in job.analyzers() {
        let reducer = analyzer.reducer().ok_or_else(|| ExecutionError::Reduce {
            component: label.clone(),
            message: "analyzer declares no reducer".to_string(),
        })?;

        let mut partial_results = Vec::with_capacity(partials.len());
        for partial in partials {
            let result = partial
                .result_for(handle)
                .ok_or_else(|| ExecutionError::Reduce {
                    component: label.clone(),
                    message: "partial run produced no result for this component".to_string(),
                })?;
            partial_results.push(result);
        }

        let reduced = reducer
            .reduce(&partial_results)
            .map_err(|failure| ExecutionError::Reduce {
                component: label.clone(),
                message: failure.message,
            })?;
        results.insert(handle, reduced);
    }

    let mut error_counts: BTreeMap<String, u64> = BTreeMap::new();
    for partial in partials {
        for (component, count) in partial.error_counts() {
            *error_counts.entry(component.clone()).or_insert(0) += count;
        }
    }

    let started_at = partials
        .iter()
        .map(AnalysisResult::started_at)
        .min()
        .unwrap_or(SystemTime::now());
    let finished_at = partials
        .iter()
        .map(AnalysisResult::finished_at)
        .max()
        .unwrap_or(SystemTime::now());

    Ok(AnalysisResult::new(
        results,
        error_counts,
        started_at,
        finished_at,
    ))
}

/// Run `job` over `partitions` non-overlapping row-range partitions of its
/// sources and reduce the partial results into one.
///
/// This exercises the distributed-worker model in-process: each partition run
/// is independent and produces a partial result per analyzer, exactly as a
/// remote worker would. Requires every source to report a
/// [`row_count_hint`](crate::source::RowSource::row_count_hint).
pub fn run_partitioned(
    job: &AnalysisJob,
    options: &RunOptions,
    partitions: usize,
) -> ExecutionResult<AnalysisResult> {
    let partitions = partitions.max(1);
    let mut partials = Vec::with_capacity(partitions);
    for index in 0..partitions {
        let mut partition_options = options.clone();
        partition_options.partition = Some(Partition {
            index,
            of: partitions,
        });
        let runner = AnalysisRunner::new(partition_options);
        partials.push(runner.run(job)?);
    }
    reduce_results(job, &partials)
}
