use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use data_quality_engine::component::{Outcome, Requirement};
use data_quality_engine::components::{
    EqualsFilter, RowCountAnalyzer, UppercaseTransformer, ValueMatcherAnalyzer,
};
use data_quality_engine::error::ExecutionError;
use data_quality_engine::job::{AnalysisJobBuilder, InputColumn};
use data_quality_engine::result::{RowCountResult, ValueMatcherResult};
use data_quality_engine::runner::{
    AnalysisListener, AnalysisRunner, ExecutionMode, Progress, RunOptions,
};
use data_quality_engine::source::DataSetSource;
use data_quality_engine::types::{DataSet, DataType, Field, InputRow, Schema, Value};
use data_quality_engine::AnalysisResult;

/// Records the callbacks a run delivers, for asserting on listener behavior.
#[derive(Default)]
struct RecordingListener {
    last_progress: Mutex<Option<Progress>>,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl AnalysisListener for RecordingListener {
    fn on_rows_processed(&self, progress: Progress, _row: &InputRow) {
        *self.last_progress.lock().unwrap() = Some(progress);
    }

    fn on_job_success(&self, _result: &AnalysisResult) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_job_failure(&self, _error: &ExecutionError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

fn single_threaded() -> RunOptions {
    RunOptions {
        mode: ExecutionMode::SingleThreaded,
        ..RunOptions::default()
    }
}

fn country_source(countries: &[&str]) -> DataSetSource {
    let schema = Schema::new(vec![Field::new("country", DataType::Utf8)]);
    let rows = countries
        .iter()
        .map(|c| vec![Value::Utf8(c.to_string())])
        .collect();
    DataSetSource::new("customers", DataSet::new(schema, rows))
}

fn row_count(result: &data_quality_engine::AnalysisResult, handle: data_quality_engine::ComponentHandle) -> u64 {
    result
        .result_for(handle)
        .unwrap()
        .as_any()
        .downcast_ref::<RowCountResult>()
        .unwrap()
        .row_count
}

#[test]
fn outcome_branches_partition_the_rows() {
    // 7 "dk" rows, 3 others.
    let source = country_source(&["dk", "dk", "us", "dk", "dk", "se", "dk", "dk", "us", "dk"]);

    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(source);
    let filter = builder.add_filter(
        EqualsFilter::new(Value::Utf8("dk".to_string())),
        vec![InputColumn::physical("customers", "country")],
    );
    let valid = builder.add_analyzer(RowCountAnalyzer::new(), vec![]);
    let invalid = builder.add_analyzer(RowCountAnalyzer::new(), vec![]);
    let all = builder.add_analyzer(RowCountAnalyzer::new(), vec![]);
    builder.set_requirement(valid, Requirement::outcome(filter, Outcome::Valid));
    builder.set_requirement(invalid, Requirement::outcome(filter, Outcome::Invalid));

    let job = builder.compile().unwrap();
    let result = AnalysisRunner::new(single_threaded()).run(&job).unwrap();

    assert_eq!(row_count(&result, valid), 7);
    assert_eq!(row_count(&result, invalid), 3);
    assert_eq!(row_count(&result, all), 10);
    assert!(result.error_counts().is_empty());
}

#[test]
fn transformed_columns_flow_to_downstream_consumers() {
    let source = country_source(&["dk", "us", "dk"]);

    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(source);
    let upper = builder.add_transformer(
        UppercaseTransformer::new(),
        vec![InputColumn::physical("customers", "country")],
    );
    let matcher = builder.add_analyzer(
        ValueMatcherAnalyzer::new(vec!["DK".to_string(), "US".to_string()]),
        vec![InputColumn::output_of(upper, 0)],
    );

    let job = builder.compile().unwrap();
    let result = AnalysisRunner::new(single_threaded()).run(&job).unwrap();

    let matches = result
        .result_for(matcher)
        .unwrap()
        .as_any()
        .downcast_ref::<ValueMatcherResult>()
        .unwrap();
    assert_eq!(matches.matches["DK"].row_count, 2);
    assert_eq!(matches.matches["US"].row_count, 1);
}

#[test]
fn transformer_gated_on_a_filter_skips_excluded_rows() {
    let source = country_source(&["dk", "us", "dk"]);

    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(source);
    let filter = builder.add_filter(
        EqualsFilter::new(Value::Utf8("dk".to_string())),
        vec![InputColumn::physical("customers", "country")],
    );
    let upper = builder.add_transformer(
        UppercaseTransformer::new(),
        vec![InputColumn::physical("customers", "country")],
    );
    builder.set_requirement(upper, Requirement::outcome(filter, Outcome::Valid));
    // No requirement of its own: runs only for rows where its virtual input
    // was actually produced.
    let downstream = builder.add_analyzer(
        RowCountAnalyzer::new(),
        vec![InputColumn::output_of(upper, 0)],
    );
    let all = builder.add_analyzer(RowCountAnalyzer::new(), vec![]);

    let job = builder.compile().unwrap();
    let result = AnalysisRunner::new(single_threaded()).run(&job).unwrap();

    assert_eq!(row_count(&result, downstream), 2);
    assert_eq!(row_count(&result, all), 3);
}

fn mixed_type_source(total: usize, bad_row: usize) -> DataSetSource {
    let schema = Schema::new(vec![Field::new("name", DataType::Utf8)]);
    let rows = (0..total)
        .map(|i| {
            if i == bad_row {
                vec![Value::Int64(i as i64)]
            } else {
                vec![Value::Utf8(format!("name-{i}"))]
            }
        })
        .collect();
    DataSetSource::new("people", DataSet::new(schema, rows))
}

#[test]
fn component_errors_are_counted_and_recovered_by_default() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(mixed_type_source(100, 5));
    let upper = builder.add_transformer(
        UppercaseTransformer::new(),
        vec![InputColumn::physical("people", "name")],
    );
    let downstream = builder.add_analyzer(
        RowCountAnalyzer::new(),
        vec![InputColumn::output_of(upper, 0)],
    );

    let job = builder.compile().unwrap();
    let result = AnalysisRunner::new(single_threaded()).run(&job).unwrap();

    // The failing row never produces the virtual column, so the downstream
    // analyzer sees 99 rows and the failure shows up in the error counts.
    assert_eq!(row_count(&result, downstream), 99);
    assert_eq!(result.error_counts().get("uppercase#0"), Some(&1));
}

#[test]
fn fatal_on_error_aborts_the_whole_job() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(mixed_type_source(100, 5));
    let upper = builder.add_transformer(
        UppercaseTransformer::new(),
        vec![InputColumn::physical("people", "name")],
    );
    builder.set_fatal_on_error(upper, true);
    builder.add_analyzer(
        RowCountAnalyzer::new(),
        vec![InputColumn::output_of(upper, 0)],
    );

    let listener = Arc::new(RecordingListener::default());
    let options = RunOptions {
        listener: Some(Arc::clone(&listener) as Arc<dyn AnalysisListener>),
        ..single_threaded()
    };

    let job = builder.compile().unwrap();
    let err = AnalysisRunner::new(options).run(&job).unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::JobAborted { ref component, .. } if component == "uppercase#0"
    ));
    // The abort is reported to the listener exactly once, and never as success.
    assert_eq!(listener.failures.load(Ordering::SeqCst), 1);
    assert_eq!(listener.successes.load(Ordering::SeqCst), 0);
}

#[test]
fn progress_reports_carry_the_expected_total() {
    let listener = Arc::new(RecordingListener::default());
    let options = RunOptions {
        listener: Some(Arc::clone(&listener) as Arc<dyn AnalysisListener>),
        ..single_threaded()
    };

    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(country_source(&["dk", "us", "dk", "se"]));
    builder.add_analyzer(RowCountAnalyzer::new(), vec![]);

    let job = builder.compile().unwrap();
    AnalysisRunner::new(options).run(&job).unwrap();

    let last = listener
        .last_progress
        .lock()
        .unwrap()
        .expect("no progress was reported");
    assert_eq!(last.processed, 4);
    assert_eq!(last.total, Some(4));
    assert_eq!(last.percent(), Some(100));
}
