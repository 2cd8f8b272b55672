//! Built-in analyzers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::component::{
    Analyzer, Component, ComponentDescriptor, ComponentInput, ExecutionContext,
};
use crate::components::render_value;
use crate::error::ProcessingError;
use crate::result::builtin::{
    AverageReducer, AverageResult, CrosstabReducer, CrosstabResult, RowCountReducer,
    RowCountResult, ValueMatcherReducer, ValueMatcherResult,
};
use crate::result::{AnalyzerResult, Crosstab, Reducer, RowAnnotation};

/// Counts the rows it observes.
pub struct RowCountAnalyzer {
    descriptor: ComponentDescriptor,
    row_count: AtomicU64,
}

impl RowCountAnalyzer {
    pub fn new() -> Self {
        static DESCRIPTOR: OnceLock<ComponentDescriptor> = OnceLock::new();
        let descriptor = DESCRIPTOR.get_or_init(|| ComponentDescriptor::new("row_count"));
        Self {
            descriptor: descriptor.clone(),
            row_count: AtomicU64::new(0),
        }
    }
}

impl Default for RowCountAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for RowCountAnalyzer {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    // Accumulation state is scoped to one run.
    fn initialize(&self, _ctx: &ExecutionContext) {
        self.row_count.store(0, Ordering::SeqCst);
    }
}

impl Analyzer for RowCountAnalyzer {
    fn process_row(&self, _input: &ComponentInput<'_>) -> Result<(), ProcessingError> {
        let _ = self.row_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn result(&self) -> Box<dyn AnalyzerResult> {
        Box::new(RowCountResult {
            row_count: self.row_count.load(Ordering::SeqCst),
        })
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        Some(Box::new(RowCountReducer))
    }
}

/// Averages the numeric values of its single input column. Nulls are skipped;
/// a non-null, non-numeric value is a row-level processing error.
pub struct AverageAnalyzer {
    descriptor: ComponentDescriptor,
    state: Mutex<(f64, u64)>,
}

impl AverageAnalyzer {
    pub fn new() -> Self {
        static DESCRIPTOR: OnceLock<ComponentDescriptor> = OnceLock::new();
        let descriptor = DESCRIPTOR.get_or_init(|| ComponentDescriptor::new("average"));
        Self {
            descriptor: descriptor.clone(),
            state: Mutex::new((0.0, 0)),
        }
    }
}

impl Default for AverageAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for AverageAnalyzer {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    fn initialize(&self, _ctx: &ExecutionContext) {
        *self.state.lock().expect("average state mutex poisoned") = (0.0, 0);
    }
}

impl Analyzer for AverageAnalyzer {
    fn process_row(&self, input: &ComponentInput<'_>) -> Result<(), ProcessingError> {
        let value = input.value(0);
        if value.is_null() {
            return Ok(());
        }
        let number = value.as_f64().ok_or_else(|| {
            ProcessingError::new(format!("expected a numeric value, got {value:?}"))
        })?;
        let mut state = self.state.lock().expect("average state mutex poisoned");
        state.0 += number;
        state.1 += 1;
        Ok(())
    }

    fn result(&self) -> Box<dyn AnalyzerResult> {
        let state = self.state.lock().expect("average state mutex poisoned");
        Box::new(AverageResult {
            sum: state.0,
            count: state.1,
        })
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        Some(Box::new(AverageReducer))
    }
}

/// Bucket for values no expected value matched.
pub const OTHER_BUCKET: &str = "<other>";

/// Matches the rendered value of its single input column against a fixed list
/// of expected values, annotating the matching rows per value. Values outside
/// the list land in the [`OTHER_BUCKET`].
pub struct ValueMatcherAnalyzer {
    descriptor: ComponentDescriptor,
    expected: Vec<String>,
    annotations: Mutex<BTreeMap<String, Arc<RowAnnotation>>>,
}

impl ValueMatcherAnalyzer {
    pub fn new(expected: Vec<String>) -> Self {
        static DESCRIPTOR: OnceLock<ComponentDescriptor> = OnceLock::new();
        let descriptor = DESCRIPTOR.get_or_init(|| ComponentDescriptor::new("value_matcher"));
        Self {
            descriptor: descriptor.clone(),
            expected,
            annotations: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Component for ValueMatcherAnalyzer {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    fn validate(&self) -> Result<(), ProcessingError> {
        if self.expected.is_empty() {
            return Err(ProcessingError::new("expected values must not be empty"));
        }
        Ok(())
    }

    fn initialize(&self, ctx: &ExecutionContext) {
        let mut annotations = self
            .annotations
            .lock()
            .expect("value matcher mutex poisoned");
        annotations.clear();
        for value in &self.expected {
            annotations.insert(value.clone(), ctx.annotations().create());
        }
        annotations.insert(OTHER_BUCKET.to_string(), ctx.annotations().create());
    }
}

impl Analyzer for ValueMatcherAnalyzer {
    fn process_row(&self, input: &ComponentInput<'_>) -> Result<(), ProcessingError> {
        let key = render_value(input.value(0));
        let annotation = {
            let annotations = self
                .annotations
                .lock()
                .expect("value matcher mutex poisoned");
            let bucket = if annotations.contains_key(&key) {
                key
            } else {
                OTHER_BUCKET.to_string()
            };
            annotations
                .get(&bucket)
                .cloned()
                .ok_or_else(|| ProcessingError::new("value matcher was not initialized"))?
        };
        annotation.annotate(input.row());
        Ok(())
    }

    fn result(&self) -> Box<dyn AnalyzerResult> {
        let annotations = self
            .annotations
            .lock()
            .expect("value matcher mutex poisoned");
        let matches = annotations
            .iter()
            .map(|(value, annotation)| (value.clone(), annotation.snapshot()))
            .collect();
        Box::new(ValueMatcherResult { matches })
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        Some(Box::new(ValueMatcherReducer))
    }
}

/// Cross-tabulates its two input columns: each row adds 1 to the cell keyed by
/// the rendered values of the first and second input.
pub struct BooleanCrosstabAnalyzer {
    descriptor: ComponentDescriptor,
    crosstab: Mutex<Crosstab>,
}

impl BooleanCrosstabAnalyzer {
    pub fn new() -> Self {
        static DESCRIPTOR: OnceLock<ComponentDescriptor> = OnceLock::new();
        let descriptor = DESCRIPTOR.get_or_init(|| ComponentDescriptor::new("boolean_crosstab"));
        Self {
            descriptor: descriptor.clone(),
            crosstab: Mutex::new(Crosstab::new()),
        }
    }
}

impl Default for BooleanCrosstabAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for BooleanCrosstabAnalyzer {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    fn initialize(&self, _ctx: &ExecutionContext) {
        *self.crosstab.lock().expect("crosstab mutex poisoned") = Crosstab::new();
    }
}

impl Analyzer for BooleanCrosstabAnalyzer {
    fn process_row(&self, input: &ComponentInput<'_>) -> Result<(), ProcessingError> {
        if input.len() < 2 {
            return Err(ProcessingError::new("crosstab requires two input columns"));
        }
        let row_key = render_value(input.value(0));
        let column_key = render_value(input.value(1));
        let mut crosstab = self.crosstab.lock().expect("crosstab mutex poisoned");
        crosstab.add(&row_key, &column_key, 1.0);
        Ok(())
    }

    fn result(&self) -> Box<dyn AnalyzerResult> {
        let crosstab = self.crosstab.lock().expect("crosstab mutex poisoned");
        Box::new(CrosstabResult {
            crosstab: crosstab.clone(),
        })
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        Some(Box::new(CrosstabReducer))
    }
}

#[cfg(test)]
mod tests {
    use super::{AverageAnalyzer, BooleanCrosstabAnalyzer, RowCountAnalyzer, ValueMatcherAnalyzer};
    use crate::component::{Analyzer, Component, ComponentInput, ExecutionContext};
    use crate::result::builtin::{AverageResult, CrosstabResult, RowCountResult, ValueMatcherResult};
    use crate::result::RowAnnotationFactory;
    use crate::types::{InputRow, Value};

    #[test]
    fn row_count_counts() {
        let analyzer = RowCountAnalyzer::new();
        let row = InputRow::new(0, vec![Value::Int64(1)], 0);
        let slots: [usize; 0] = [];
        for _ in 0..3 {
            analyzer
                .process_row(&ComponentInput::new(&row, &slots))
                .unwrap();
        }
        let result = analyzer.result();
        let result = result.as_any().downcast_ref::<RowCountResult>().unwrap();
        assert_eq!(result.row_count, 3);
    }

    #[test]
    fn average_skips_nulls_and_rejects_strings() {
        let analyzer = AverageAnalyzer::new();
        let slots = [0usize];
        for value in [Value::Int64(2), Value::Null, Value::Float64(4.0)] {
            let row = InputRow::new(0, vec![value], 0);
            analyzer
                .process_row(&ComponentInput::new(&row, &slots))
                .unwrap();
        }
        let bad = InputRow::new(0, vec![Value::Utf8("x".to_string())], 0);
        assert!(analyzer
            .process_row(&ComponentInput::new(&bad, &slots))
            .is_err());

        let result = analyzer.result();
        let result = result.as_any().downcast_ref::<AverageResult>().unwrap();
        assert_eq!(result.average(), Some(3.0));
    }

    #[test]
    fn value_matcher_buckets_unexpected_values() {
        let analyzer = ValueMatcherAnalyzer::new(vec!["yes".to_string(), "no".to_string()]);
        analyzer.initialize(&ExecutionContext::new(RowAnnotationFactory::new(10)));

        let slots = [0usize];
        for value in ["yes", "yes", "maybe"] {
            let row = InputRow::new(0, vec![Value::Utf8(value.to_string())], 0);
            analyzer
                .process_row(&ComponentInput::new(&row, &slots))
                .unwrap();
        }
        let result = analyzer.result();
        let result = result.as_any().downcast_ref::<ValueMatcherResult>().unwrap();
        assert_eq!(result.matches["yes"].row_count, 2);
        assert_eq!(result.matches["no"].row_count, 0);
        assert_eq!(result.matches[super::OTHER_BUCKET].row_count, 1);
        assert_eq!(result.matches["yes"].sample.len(), 2);
    }

    #[test]
    fn crosstab_counts_value_pairs() {
        let analyzer = BooleanCrosstabAnalyzer::new();
        let slots = [0usize, 1];
        for (a, b) in [(true, false), (true, false), (false, false)] {
            let row = InputRow::new(0, vec![Value::Bool(a), Value::Bool(b)], 0);
            analyzer
                .process_row(&ComponentInput::new(&row, &slots))
                .unwrap();
        }
        let result = analyzer.result();
        let result = result.as_any().downcast_ref::<CrosstabResult>().unwrap();
        assert_eq!(result.crosstab.get("true", "false"), 2.0);
        assert_eq!(result.crosstab.get("false", "false"), 1.0);
    }
}
