use std::time::Duration;

use thiserror::Error;

/// Convenience result type for job compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Convenience result type for job execution.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Error raised while compiling a job graph into consumer chains.
///
/// Compile errors are always fatal and are surfaced before any row source is
/// opened. Each variant is a distinct failure kind so callers (and tests) can
/// match on the exact cause.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A component declared an input column that cannot be resolved: either a
    /// physical column absent from every registered source table, or a virtual
    /// column whose producer is not part of the job.
    #[error("unresolved input column '{column}' for component '{component}'")]
    UnresolvedInputColumn { component: String, column: String },

    /// The virtual-column dependency graph contains a cycle.
    #[error("cyclic virtual-column dependency involving component '{component}'")]
    CyclicDependency { component: String },

    /// A component's physical input columns span more than one source table.
    #[error("component '{component}' reads from multiple source tables: {tables:?}")]
    AmbiguousSourceTable {
        component: String,
        tables: Vec<String>,
    },

    /// A requirement references a filter that is not in the job, or an outcome
    /// that filter never produces.
    #[error("requirement of component '{component}' is dangling: {reason}")]
    DanglingRequirement { component: String, reason: String },

    /// The job contains no analyzers, so no execution could ever produce a
    /// result.
    #[error("job has no analyzers; nothing would produce a result")]
    NoResultProducers,

    /// Distributed execution was requested but an analyzer declares no reducer
    /// binding, so its partial results could never be merged.
    #[error("analyzer '{component}' declares no reducer; distributed execution is not possible")]
    MissingReducer { component: String },
}

/// Error raised by a component while processing a single row.
///
/// By default this is recovered: the engine reports it to the listener, counts
/// it against the component and continues with the rest of the chain. If the
/// component is marked fatal-on-error it escalates to
/// [`ExecutionError::JobAborted`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProcessingError {
    /// Human-readable cause.
    pub message: String,
}

impl ProcessingError {
    /// Create a processing error from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised while reading rows from a row source.
///
/// Source errors are always fatal: once the source fails, the remaining rows
/// are unknowable.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A value could not be parsed into the schema's declared type.
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    Parse {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// The source data does not conform to the declared schema.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },
}

/// Fatal error raised while executing a compiled job.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A component failed validation or initialization before any row was
    /// processed.
    #[error("component '{component}' failed to start: {message}")]
    InvalidComponent { component: String, message: String },

    /// A fatal-on-error component failed while processing a row and aborted
    /// the whole job.
    #[error("job aborted by component '{component}'")]
    JobAborted {
        component: String,
        #[source]
        source: ProcessingError,
    },

    /// The row source failed mid-stream.
    #[error("row source '{table}' failed")]
    SourceRead {
        table: String,
        #[source]
        source: SourceError,
    },

    /// Partial results could not be merged into a single result.
    #[error("reduce failed for component '{component}': {message}")]
    Reduce { component: String, message: String },

    /// The configured timeout elapsed before the job finished.
    #[error("job timed out after {after:?}")]
    Timeout { after: Duration },

    /// The job was cancelled via its cancellation token.
    #[error("job cancelled")]
    Cancelled,
}
