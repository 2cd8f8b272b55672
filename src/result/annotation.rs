//! Row annotations: thread-safe counters with a bounded row sample.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::types::{InputRow, Value};

/// Default bound on the number of sampled rows per annotation.
pub const DEFAULT_SAMPLE_CAP: usize = 500;

/// A mutable, thread-safe record of the rows that matched some predicate:
/// a count plus a bounded sample of the matching rows' physical values.
///
/// Annotations are created through a [`RowAnnotationFactory`] scoped to one
/// analyzer's result, updated concurrently by worker threads, and merged
/// across distributed partials by summing counts and unioning samples up to
/// the cap.
#[derive(Debug)]
pub struct RowAnnotation {
    row_count: AtomicU64,
    sample: Mutex<Vec<Vec<Value>>>,
    sample_cap: usize,
}

impl RowAnnotation {
    fn new(sample_cap: usize) -> Self {
        Self {
            row_count: AtomicU64::new(0),
            sample: Mutex::new(Vec::new()),
            sample_cap,
        }
    }

    /// Mark `row` as matching. Increments the count and, while below the cap,
    /// stores the row's physical values in the sample.
    pub fn annotate(&self, row: &InputRow) {
        let _ = self.row_count.fetch_add(1, Ordering::SeqCst);
        let mut sample = self.sample.lock().expect("annotation mutex poisoned");
        if sample.len() < self.sample_cap {
            sample.push(row.physical_values().to_vec());
        }
    }

    /// Number of annotated rows.
    pub fn row_count(&self) -> u64 {
        self.row_count.load(Ordering::SeqCst)
    }

    /// Immutable snapshot of this annotation's current state.
    pub fn snapshot(&self) -> AnnotationSnapshot {
        let sample = self.sample.lock().expect("annotation mutex poisoned");
        AnnotationSnapshot {
            row_count: self.row_count(),
            sample: sample.clone(),
            sample_cap: self.sample_cap,
        }
    }
}

/// Creates [`RowAnnotation`]s with a configured sample cap.
///
/// Handed to analyzers through the
/// [`ExecutionContext`](crate::component::ExecutionContext) at initialize
/// time.
#[derive(Debug, Clone)]
pub struct RowAnnotationFactory {
    sample_cap: usize,
}

impl Default for RowAnnotationFactory {
    fn default() -> Self {
        Self {
            sample_cap: DEFAULT_SAMPLE_CAP,
        }
    }
}

impl RowAnnotationFactory {
    /// Create a factory whose annotations keep at most `sample_cap` sampled
    /// rows.
    pub fn new(sample_cap: usize) -> Self {
        Self { sample_cap }
    }

    /// Create a new, empty annotation.
    pub fn create(&self) -> Arc<RowAnnotation> {
        Arc::new(RowAnnotation::new(self.sample_cap))
    }

    /// The configured sample cap.
    pub fn sample_cap(&self) -> usize {
        self.sample_cap
    }
}

/// Frozen state of a [`RowAnnotation`], as carried inside analyzer results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationSnapshot {
    /// Number of annotated rows.
    pub row_count: u64,
    /// Sampled rows (physical values), at most `sample_cap` of them.
    pub sample: Vec<Vec<Value>>,
    /// The cap the sample was collected under.
    pub sample_cap: usize,
}

impl AnnotationSnapshot {
    /// An empty snapshot with the given cap.
    pub fn empty(sample_cap: usize) -> Self {
        Self {
            row_count: 0,
            sample: Vec::new(),
            sample_cap,
        }
    }

    /// Merge another snapshot into this one: counts sum, samples union up to
    /// the cap.
    pub fn merge(&mut self, other: &AnnotationSnapshot) {
        self.row_count += other.row_count;
        for row in &other.sample {
            if self.sample.len() >= self.sample_cap {
                break;
            }
            self.sample.push(row.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RowAnnotationFactory;
    use crate::types::{InputRow, Value};

    fn row(id: u64) -> InputRow {
        InputRow::new(id, vec![Value::Int64(id as i64)], 0)
    }

    #[test]
    fn annotate_counts_beyond_the_sample_cap() {
        let factory = RowAnnotationFactory::new(2);
        let annotation = factory.create();
        for i in 0..5 {
            annotation.annotate(&row(i));
        }

        let snapshot = annotation.snapshot();
        assert_eq!(snapshot.row_count, 5);
        assert_eq!(snapshot.sample.len(), 2);
    }

    #[test]
    fn merge_sums_counts_and_bounds_the_sample() {
        let factory = RowAnnotationFactory::new(3);
        let a = factory.create();
        let b = factory.create();
        for i in 0..2 {
            a.annotate(&row(i));
        }
        for i in 2..6 {
            b.annotate(&row(i));
        }

        let mut merged = a.snapshot();
        merged.merge(&b.snapshot());
        assert_eq!(merged.row_count, 6);
        assert_eq!(merged.sample.len(), 3);
    }
}
