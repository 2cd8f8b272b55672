//! A data-quality analysis engine: compile a job graph of filters,
//! transformers and analyzers over tabular row sources, then execute it
//! single- or multi-threaded and collect per-analyzer results.
//!
//! A job is built incrementally: register row sources, add components bound to
//! input columns, gate branches with filter-outcome requirements, then compile.
//! Compilation validates the whole graph up front, orders each source's
//! consumers topologically and folds eligible leading filters into the source
//! query. Execution streams rows through the compiled chains; analyzers
//! accumulate thread-safe state and emit one result each at the end.
//!
//! ```
//! use data_quality_engine::components::{EqualsFilter, RowCountAnalyzer};
//! use data_quality_engine::component::{Outcome, Requirement};
//! use data_quality_engine::job::{AnalysisJobBuilder, InputColumn};
//! use data_quality_engine::result::RowCountResult;
//! use data_quality_engine::runner::{AnalysisRunner, ExecutionMode, RunOptions};
//! use data_quality_engine::source::DataSetSource;
//! use data_quality_engine::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let schema = Schema::new(vec![Field::new("country", DataType::Utf8)]);
//! let rows = ["dk", "us", "dk"]
//!     .iter()
//!     .map(|c| vec![Value::Utf8(c.to_string())])
//!     .collect();
//! let source = DataSetSource::new("customers", DataSet::new(schema, rows));
//!
//! let mut builder = AnalysisJobBuilder::new();
//! builder.add_source(source);
//! let filter = builder.add_filter(
//!     EqualsFilter::new(Value::Utf8("dk".to_string())),
//!     vec![InputColumn::physical("customers", "country")],
//! );
//! let counter = builder.add_analyzer(RowCountAnalyzer::new(), vec![]);
//! builder.set_requirement(counter, Requirement::outcome(filter, Outcome::Valid));
//!
//! let job = builder.compile().unwrap();
//! let runner = AnalysisRunner::new(RunOptions {
//!     mode: ExecutionMode::SingleThreaded,
//!     ..RunOptions::default()
//! });
//! let result = runner.run(&job).unwrap();
//!
//! let count = result.result_for(counter).unwrap();
//! let count = count.as_any().downcast_ref::<RowCountResult>().unwrap();
//! assert_eq!(count.row_count, 2);
//! ```

pub mod component;
pub mod components;
pub mod error;
pub mod job;
pub mod result;
pub mod runner;
pub mod source;
pub mod types;

pub use component::{ComponentHandle, Outcome, Requirement};
pub use error::{CompileError, ExecutionError, ProcessingError, SourceError};
pub use job::{AnalysisJob, AnalysisJobBuilder, CompileOptions, InputColumn};
pub use result::{reduce_results, run_partitioned, AnalysisResult};
pub use runner::{AnalysisRunner, CancellationToken, ExecutionMode, Partition, RunOptions};
