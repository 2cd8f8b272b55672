use data_quality_engine::component::{Outcome, Requirement};
use data_quality_engine::components::{
    EqualsFilter, NotNullFilter, RowCountAnalyzer, UppercaseTransformer,
};
use data_quality_engine::error::{CompileError, SourceError};
use data_quality_engine::job::{AnalysisJobBuilder, InputColumn};
use data_quality_engine::source::{
    DataSetSource, QueryConstraints, RowSource, RowStream, SourceCapabilities,
};
use data_quality_engine::types::{DataSet, DataType, Field, Schema, Value};

fn customers() -> DataSetSource {
    let schema = Schema::new(vec![
        Field::new("country", DataType::Utf8),
        Field::new("amount", DataType::Int64),
    ]);
    let rows = vec![
        vec![Value::Utf8("dk".to_string()), Value::Int64(10)],
        vec![Value::Utf8("us".to_string()), Value::Int64(20)],
    ];
    DataSetSource::new("customers", DataSet::new(schema, rows))
}

#[test]
fn unresolved_physical_column_is_rejected() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(customers());
    builder.add_filter(
        NotNullFilter::new(),
        vec![InputColumn::physical("customers", "no_such_column")],
    );
    builder.add_analyzer(RowCountAnalyzer::new(), vec![]);

    let err = builder.compile().unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnresolvedInputColumn { ref column, .. }
            if column.contains("no_such_column")
    ));
}

#[test]
fn unresolved_virtual_column_is_rejected() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(customers());
    let transformer = builder.add_transformer(
        UppercaseTransformer::new(),
        vec![InputColumn::physical("customers", "country")],
    );
    // The transformer declares a single output column; index 3 does not exist.
    builder.add_analyzer(
        RowCountAnalyzer::new(),
        vec![InputColumn::output_of(transformer, 3)],
    );

    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::UnresolvedInputColumn { .. }));
}

#[test]
fn requirement_on_a_non_filter_is_dangling() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(customers());
    let transformer = builder.add_transformer(
        UppercaseTransformer::new(),
        vec![InputColumn::physical("customers", "country")],
    );
    let analyzer = builder.add_analyzer(RowCountAnalyzer::new(), vec![]);
    builder.set_requirement(analyzer, Requirement::outcome(transformer, Outcome::Valid));

    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::DanglingRequirement { .. }));
}

#[test]
fn requirement_on_an_undeclared_outcome_is_dangling() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(customers());
    let filter = builder.add_filter(
        NotNullFilter::new(),
        vec![InputColumn::physical("customers", "country")],
    );
    let analyzer = builder.add_analyzer(RowCountAnalyzer::new(), vec![]);
    builder.set_requirement(
        analyzer,
        Requirement::outcome(filter, Outcome::category("UNIQUE")),
    );

    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::DanglingRequirement { .. }));
}

#[test]
fn job_without_analyzers_is_rejected() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(customers());
    builder.add_filter(
        NotNullFilter::new(),
        vec![InputColumn::physical("customers", "country")],
    );

    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::NoResultProducers));
}

#[test]
fn cyclic_virtual_dependency_is_rejected() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(customers());
    let a = builder.add_transformer(
        UppercaseTransformer::new(),
        vec![InputColumn::physical("customers", "country")],
    );
    let b = builder.add_transformer(
        UppercaseTransformer::new(),
        vec![InputColumn::output_of(a, 0)],
    );
    // Rebind a's input to b's output, closing the cycle a -> b -> a.
    builder.set_inputs(a, vec![InputColumn::output_of(b, 0)]);
    builder.add_analyzer(RowCountAnalyzer::new(), vec![InputColumn::output_of(b, 0)]);

    let err = builder.compile().unwrap_err();
    assert!(matches!(err, CompileError::CyclicDependency { .. }));
}

#[test]
fn inputs_spanning_two_tables_are_ambiguous() {
    let other_schema = Schema::new(vec![Field::new("code", DataType::Utf8)]);
    let other = DataSetSource::new("countries", DataSet::new(other_schema, vec![]));

    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(customers());
    builder.add_source(other);
    builder.add_analyzer(
        RowCountAnalyzer::new(),
        vec![
            InputColumn::physical("customers", "country"),
            InputColumn::physical("countries", "code"),
        ],
    );

    let err = builder.compile().unwrap_err();
    assert!(matches!(
        err,
        CompileError::AmbiguousSourceTable { ref tables, .. } if tables.len() == 2
    ));
}

#[test]
fn compiling_twice_yields_identical_orderings() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(customers());
    let filter = builder.add_filter(
        NotNullFilter::new(),
        vec![InputColumn::physical("customers", "country")],
    );
    let transformer = builder.add_transformer(
        UppercaseTransformer::new(),
        vec![InputColumn::physical("customers", "country")],
    );
    builder.set_requirement(transformer, Requirement::outcome(filter, Outcome::Valid));
    builder.add_analyzer(
        RowCountAnalyzer::new(),
        vec![InputColumn::output_of(transformer, 0)],
    );
    builder.add_analyzer(RowCountAnalyzer::new(), vec![]);

    let first = builder.compile().unwrap();
    let second = builder.compile().unwrap();
    assert_eq!(
        first.chains()[0].consumer_labels(),
        second.chains()[0].consumer_labels()
    );
    assert_eq!(format!("{first:?}"), format!("{second:?}"));
}

/// A source whose `open` always fails, to prove compilation never touches it.
struct UnopenableSource {
    inner: DataSetSource,
}

impl RowSource for UnopenableSource {
    fn table_name(&self) -> &str {
        self.inner.table_name()
    }

    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.inner.capabilities()
    }

    fn open(&self, _constraints: &QueryConstraints) -> Result<Box<dyn RowStream>, SourceError> {
        Err(SourceError::SchemaMismatch {
            message: "opened during compilation".to_string(),
        })
    }
}

#[test]
fn compilation_never_opens_a_source() {
    let mut builder = AnalysisJobBuilder::new();
    builder.add_source(UnopenableSource { inner: customers() });
    builder.add_filter(
        EqualsFilter::new(Value::Utf8("dk".to_string())),
        vec![InputColumn::physical("customers", "country")],
    );
    builder.add_analyzer(RowCountAnalyzer::new(), vec![]);

    assert!(builder.compile().is_ok());
}
