//! Concrete result types for the built-in analyzers, with their reducers.
//!
//! Reduction rules: counts sum; averages recompute from merged sub-state
//! (weighted by row count, never an average of averages); annotations sum
//! counts and union samples up to the cap; crosstabs merge cell by cell.

use std::any::Any;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::result::annotation::AnnotationSnapshot;
use crate::result::crosstab::Crosstab;
use crate::result::reduce::{downcast_partial, ReduceFailure, Reducer};
use crate::result::{AnalyzerResult, Metric};

/// Result of a row-counting analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowCountResult {
    /// Number of rows observed.
    pub row_count: u64,
}

impl AnalyzerResult for RowCountResult {
    fn metrics(&self) -> Vec<Metric> {
        vec![Metric::new("row_count", self.row_count as f64)]
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Sums partial row counts.
#[derive(Debug, Default)]
pub struct RowCountReducer;

impl Reducer for RowCountReducer {
    fn reduce(&self, partials: &[&dyn AnalyzerResult]) -> Result<Box<dyn AnalyzerResult>, ReduceFailure> {
        let mut row_count = 0u64;
        for partial in partials {
            row_count += downcast_partial::<RowCountResult>(*partial, "RowCountResult")?.row_count;
        }
        Ok(Box::new(RowCountResult { row_count }))
    }
}

/// Result of an averaging analyzer. Carries its sub-state (sum and count) so
/// partials can be merged exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageResult {
    /// Sum of all observed non-null values.
    pub sum: f64,
    /// Number of observed non-null values.
    pub count: u64,
}

impl AverageResult {
    /// The average, or `None` if no value was observed.
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

impl AnalyzerResult for AverageResult {
    fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::new("average", self.average().unwrap_or(0.0)),
            Metric::new("value_count", self.count as f64),
        ]
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Merges average sub-states; the merged average is weighted by value count.
#[derive(Debug, Default)]
pub struct AverageReducer;

impl Reducer for AverageReducer {
    fn reduce(&self, partials: &[&dyn AnalyzerResult]) -> Result<Box<dyn AnalyzerResult>, ReduceFailure> {
        let mut sum = 0.0;
        let mut count = 0u64;
        for partial in partials {
            let partial = downcast_partial::<AverageResult>(*partial, "AverageResult")?;
            sum += partial.sum;
            count += partial.count;
        }
        Ok(Box::new(AverageResult { sum, count }))
    }
}

/// Result of a value-matching analyzer: one annotation per expected value
/// (plus an `"<other>"` bucket).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueMatcherResult {
    /// Annotation snapshot per matched value.
    pub matches: BTreeMap<String, AnnotationSnapshot>,
}

impl AnalyzerResult for ValueMatcherResult {
    fn metrics(&self) -> Vec<Metric> {
        self.matches
            .iter()
            .map(|(value, annotation)| {
                Metric::new(format!("match_count({value})"), annotation.row_count as f64)
            })
            .collect()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Unions value-matcher annotations: counts sum, samples union up to the cap.
#[derive(Debug, Default)]
pub struct ValueMatcherReducer;

impl Reducer for ValueMatcherReducer {
    fn reduce(&self, partials: &[&dyn AnalyzerResult]) -> Result<Box<dyn AnalyzerResult>, ReduceFailure> {
        let mut matches: BTreeMap<String, AnnotationSnapshot> = BTreeMap::new();
        for partial in partials {
            let partial = downcast_partial::<ValueMatcherResult>(*partial, "ValueMatcherResult")?;
            for (value, annotation) in &partial.matches {
                match matches.get_mut(value) {
                    Some(merged) => merged.merge(annotation),
                    None => {
                        matches.insert(value.clone(), annotation.clone());
                    }
                }
            }
        }
        Ok(Box::new(ValueMatcherResult { matches }))
    }
}

/// Result of a crosstab analyzer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrosstabResult {
    /// The two-dimensional aggregation.
    pub crosstab: Crosstab,
}

impl AnalyzerResult for CrosstabResult {
    fn metrics(&self) -> Vec<Metric> {
        let mut metrics = vec![Metric::new("total", self.crosstab.total())];
        metrics.extend(
            self.crosstab
                .iter()
                .map(|(row, column, value)| Metric::new(format!("cell({row},{column})"), value)),
        );
        metrics
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Merges crosstabs cell by cell.
#[derive(Debug, Default)]
pub struct CrosstabReducer;

impl Reducer for CrosstabReducer {
    fn reduce(&self, partials: &[&dyn AnalyzerResult]) -> Result<Box<dyn AnalyzerResult>, ReduceFailure> {
        let mut crosstab = Crosstab::new();
        for partial in partials {
            let partial = downcast_partial::<CrosstabResult>(*partial, "CrosstabResult")?;
            crosstab.merge(&partial.crosstab);
        }
        Ok(Box::new(CrosstabResult { crosstab }))
    }
}
