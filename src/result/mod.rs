//! Analyzer results, row annotations, crosstabs and result reduction.

pub mod annotation;
pub mod builtin;
pub mod crosstab;
pub mod reduce;

pub use annotation::{AnnotationSnapshot, RowAnnotation, RowAnnotationFactory};
pub use builtin::{AverageResult, CrosstabResult, RowCountResult, ValueMatcherResult};
pub use crosstab::Crosstab;
pub use reduce::{reduce_results, run_partitioned, ReduceFailure, Reducer};

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

use crate::component::ComponentHandle;

/// A named numeric metric exposed by an [`AnalyzerResult`], for comparison
/// across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Metric name, unique within one result.
    pub name: String,
    /// Metric value.
    pub value: f64,
}

impl Metric {
    /// Create a metric.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// The value produced by one analyzer at the end of a run.
///
/// Results are opaque to the engine; it only requires named numeric metrics,
/// a JSON rendering, and downcast access so a [`Reducer`] can merge partials
/// of its own concrete type.
pub trait AnalyzerResult: fmt::Debug + Send + Sync {
    /// Named numeric metrics of this result.
    fn metrics(&self) -> Vec<Metric>;

    /// Serialize this result. The default renders the metrics only; concrete
    /// results override this with their full state.
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.metrics()).unwrap_or(serde_json::Value::Null)
    }

    /// Downcast access for reducers.
    fn as_any(&self) -> &dyn Any;
}

/// The final output of a run: one [`AnalyzerResult`] per analyzer component,
/// the per-component non-fatal error counts, and the wall-clock window of the
/// run.
#[derive(Debug)]
pub struct AnalysisResult {
    results: BTreeMap<ComponentHandle, Box<dyn AnalyzerResult>>,
    error_counts: BTreeMap<String, u64>,
    started_at: SystemTime,
    finished_at: SystemTime,
}

impl AnalysisResult {
    pub(crate) fn new(
        results: BTreeMap<ComponentHandle, Box<dyn AnalyzerResult>>,
        error_counts: BTreeMap<String, u64>,
        started_at: SystemTime,
        finished_at: SystemTime,
    ) -> Self {
        Self {
            results,
            error_counts,
            started_at,
            finished_at,
        }
    }

    /// The result of the analyzer added as `handle`, if it produced one.
    pub fn result_for(&self, handle: ComponentHandle) -> Option<&dyn AnalyzerResult> {
        self.results.get(&handle).map(|r| r.as_ref())
    }

    /// All results, keyed by component handle.
    pub fn results(&self) -> &BTreeMap<ComponentHandle, Box<dyn AnalyzerResult>> {
        &self.results
    }

    /// Non-fatal per-row error counts, keyed by component identity.
    ///
    /// Individual row errors are reported to the listener as they happen;
    /// this summary is what survives into the result.
    pub fn error_counts(&self) -> &BTreeMap<String, u64> {
        &self.error_counts
    }

    /// Wall-clock start of the run.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Wall-clock end of the run.
    pub fn finished_at(&self) -> SystemTime {
        self.finished_at
    }
}
