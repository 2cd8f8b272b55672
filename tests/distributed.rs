use data_quality_engine::component::{Analyzer, Component, ComponentDescriptor, ComponentInput};
use data_quality_engine::components::{
    AverageAnalyzer, BooleanCrosstabAnalyzer, RowCountAnalyzer, ValueMatcherAnalyzer,
};
use data_quality_engine::error::{CompileError, ProcessingError};
use data_quality_engine::job::{AnalysisJobBuilder, CompileOptions, InputColumn};
use data_quality_engine::result::{
    run_partitioned, AverageResult, CrosstabResult, RowCountResult, ValueMatcherResult,
};
use data_quality_engine::runner::{AnalysisRunner, ExecutionMode, RunOptions};
use data_quality_engine::source::DataSetSource;
use data_quality_engine::types::{DataSet, DataType, Field, Schema, Value};

fn single_threaded() -> RunOptions {
    RunOptions {
        mode: ExecutionMode::SingleThreaded,
        ..RunOptions::default()
    }
}

fn transactions(total: usize) -> DataSetSource {
    let schema = Schema::new(vec![
        Field::new("amount", DataType::Int64),
        Field::new("approved", DataType::Bool),
        Field::new("flagged", DataType::Bool),
    ]);
    let rows = (0..total)
        .map(|i| {
            vec![
                Value::Int64(i as i64),
                Value::Bool(i % 2 == 0),
                Value::Bool(i % 7 == 0),
            ]
        })
        .collect();
    DataSetSource::new("transactions", DataSet::new(schema, rows))
}

struct Handles {
    counter: data_quality_engine::ComponentHandle,
    average: data_quality_engine::ComponentHandle,
    matcher: data_quality_engine::ComponentHandle,
    crosstab: data_quality_engine::ComponentHandle,
}

fn build(builder: &mut AnalysisJobBuilder) -> Handles {
    Handles {
        counter: builder.add_analyzer(RowCountAnalyzer::new(), vec![]),
        average: builder.add_analyzer(
            AverageAnalyzer::new(),
            vec![InputColumn::physical("transactions", "amount")],
        ),
        matcher: builder.add_analyzer(
            ValueMatcherAnalyzer::new(vec!["true".to_string(), "false".to_string()]),
            vec![InputColumn::physical("transactions", "approved")],
        ),
        crosstab: builder.add_analyzer(
            BooleanCrosstabAnalyzer::new(),
            vec![
                InputColumn::physical("transactions", "approved"),
                InputColumn::physical("transactions", "flagged"),
            ],
        ),
    }
}

#[test]
fn partitioned_runs_reduce_to_the_one_pass_result() {
    // Reference: one pass over all rows.
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(transactions(100));
    let handles = build(&mut builder);
    let job = builder.compile().unwrap();
    let reference = AnalysisRunner::new(single_threaded()).run(&job).unwrap();

    // Partitioned: fresh analyzer state, three row-range windows, reduced.
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(transactions(100));
    let partitioned_handles = build(&mut builder);
    let job = builder
        .compile_with(&CompileOptions {
            distributed: true,
            ..CompileOptions::default()
        })
        .unwrap();
    let reduced = run_partitioned(&job, &single_threaded(), 3).unwrap();

    let counter = reduced
        .result_for(partitioned_handles.counter)
        .unwrap()
        .as_any()
        .downcast_ref::<RowCountResult>()
        .unwrap();
    let reference_counter = reference
        .result_for(handles.counter)
        .unwrap()
        .as_any()
        .downcast_ref::<RowCountResult>()
        .unwrap();
    assert_eq!(counter, reference_counter);
    assert_eq!(counter.row_count, 100);

    let average = reduced
        .result_for(partitioned_handles.average)
        .unwrap()
        .as_any()
        .downcast_ref::<AverageResult>()
        .unwrap();
    let reference_average = reference
        .result_for(handles.average)
        .unwrap()
        .as_any()
        .downcast_ref::<AverageResult>()
        .unwrap();
    assert_eq!(average, reference_average);

    let matcher = reduced
        .result_for(partitioned_handles.matcher)
        .unwrap()
        .as_any()
        .downcast_ref::<ValueMatcherResult>()
        .unwrap();
    let reference_matcher = reference
        .result_for(handles.matcher)
        .unwrap()
        .as_any()
        .downcast_ref::<ValueMatcherResult>()
        .unwrap();
    assert_eq!(matcher.matches["true"].row_count, 50);
    assert_eq!(
        matcher.matches["true"].row_count,
        reference_matcher.matches["true"].row_count
    );

    let crosstab = reduced
        .result_for(partitioned_handles.crosstab)
        .unwrap()
        .as_any()
        .downcast_ref::<CrosstabResult>()
        .unwrap();
    let reference_crosstab = reference
        .result_for(handles.crosstab)
        .unwrap()
        .as_any()
        .downcast_ref::<CrosstabResult>()
        .unwrap();
    assert_eq!(crosstab, reference_crosstab);
    assert_eq!(crosstab.crosstab.total(), 100.0);
}

/// An analyzer with no reducer binding, to exercise the distributed compile
/// check.
struct IrreducibleAnalyzer {
    descriptor: ComponentDescriptor,
}

impl IrreducibleAnalyzer {
    fn new() -> Self {
        Self {
            descriptor: ComponentDescriptor::new("irreducible"),
        }
    }
}

impl Component for IrreducibleAnalyzer {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }
}

impl Analyzer for IrreducibleAnalyzer {
    fn process_row(&self, _input: &ComponentInput<'_>) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn result(&self) -> Box<dyn data_quality_engine::result::AnalyzerResult> {
        Box::new(RowCountResult { row_count: 0 })
    }
}

#[test]
fn distributed_compilation_requires_reducers() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(transactions(10));
    builder.add_analyzer(IrreducibleAnalyzer::new(), vec![]);

    // Local compilation accepts it; distributed compilation rejects it.
    assert!(builder.compile().is_ok());
    let err = builder
        .compile_with(&CompileOptions {
            distributed: true,
            ..CompileOptions::default()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::MissingReducer { ref component } if component == "irreducible#0"
    ));
}
