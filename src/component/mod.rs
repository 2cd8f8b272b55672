//! The component contract.
//!
//! Every filter, transformer and analyzer implements [`Component`] plus its
//! kind-specific trait. Component instances are opaque to the engine: it
//! configures, validates, initializes, feeds rows to, and finally closes them,
//! and guarantees that every component sees exactly the rows its
//! [`Requirement`] admits, after all of its upstream dependencies have
//! processed the same row.
//!
//! Components never see slot numbers or source schemas; the engine hands each
//! `process` call a [`ComponentInput`] view exposing the component's declared
//! input columns positionally.

pub mod descriptor;
pub mod outcome;

pub use descriptor::{ComponentDescriptor, PropertyDescriptor};
pub use outcome::{ComponentHandle, FilterOutcomes, Outcome, OutcomeRef, Requirement};

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ProcessingError;
use crate::result::{AnalyzerResult, Reducer, RowAnnotationFactory};
use crate::source::QueryConstraints;
use crate::types::{InputRow, Value};

/// Shared state threaded through `initialize`/`close` instead of global
/// singletons: the row-annotation factory for this run, and named reference
/// data (shared dictionaries, lookup tables) registered by the caller.
pub struct ExecutionContext {
    annotations: RowAnnotationFactory,
    reference_data: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ExecutionContext {
    /// Create a context with the given annotation factory and no reference
    /// data.
    pub fn new(annotations: RowAnnotationFactory) -> Self {
        Self {
            annotations,
            reference_data: BTreeMap::new(),
        }
    }

    /// Register a named piece of shared reference data.
    pub fn with_reference_data(
        mut self,
        name: impl Into<String>,
        data: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        self.reference_data.insert(name.into(), data);
        self
    }

    /// The row-annotation factory for this run.
    pub fn annotations(&self) -> &RowAnnotationFactory {
        &self.annotations
    }

    /// Look up shared reference data by name.
    pub fn reference_data(&self, name: &str) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.reference_data.get(name)
    }
}

/// A component's view of one row: its declared input columns, positionally,
/// plus the underlying row for components that sample whole rows.
pub struct ComponentInput<'r> {
    row: &'r InputRow,
    slots: &'r [usize],
}

impl<'r> ComponentInput<'r> {
    pub(crate) fn new(row: &'r InputRow, slots: &'r [usize]) -> Self {
        Self { row, slots }
    }

    /// Number of declared input columns.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the component declared no input columns.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The value of the `i`-th declared input column for this row.
    pub fn value(&self, i: usize) -> &Value {
        self.row.value(self.slots[i])
    }

    /// The underlying row (for annotation sampling and progress callbacks).
    pub fn row(&self) -> &InputRow {
        self.row
    }
}

/// Lifecycle contract shared by all component kinds.
///
/// `process`-time methods take `&self`: accumulating components own their
/// mutability internally (atomics or locks), which is what makes the
/// multi-threaded task runner safe.
pub trait Component: Send + Sync {
    /// Static description of this component type.
    fn descriptor(&self) -> &ComponentDescriptor;

    /// Apply configuration properties by name, as declared in the descriptor.
    ///
    /// Configuration happens while the caller still owns the instance, before
    /// it is added to a job; once added, components are shared and immutable.
    fn configure(&mut self, _properties: &BTreeMap<String, Value>) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Check that the configuration is complete and coherent. Called once
    /// before any row is processed; a failure is fatal for the job.
    fn validate(&self) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Acquire resources. Called once per run, before the first row.
    fn initialize(&self, _ctx: &ExecutionContext) {}

    /// Release resources. Called exactly once per run on every exit path,
    /// in reverse chain order.
    fn close(&self) {}
}

/// A component that categorizes rows into [`Outcome`]s, gating downstream
/// branches.
pub trait Filter: Component {
    /// Categorize one row. The outcome must be one of those declared in the
    /// descriptor.
    fn categorize(&self, input: &ComponentInput<'_>) -> Result<Outcome, ProcessingError>;

    /// Fold the semantics of `outcome` into a source query.
    ///
    /// `input_columns` holds the physical column names this filter instance is
    /// bound to, positionally. Return `true` if `constraints` now fully
    /// expresses the outcome (the filter can be removed from the runtime
    /// chain), `false` if this outcome cannot be pushed down.
    fn optimize_query(
        &self,
        _outcome: &Outcome,
        _input_columns: &[String],
        _constraints: &mut QueryConstraints,
    ) -> bool {
        false
    }
}

/// A component that derives virtual column values from each row.
pub trait Transformer: Component {
    /// Produce the values of this component's declared output columns for one
    /// row. The returned vector must match the descriptor's
    /// `output_columns` in length and order.
    fn transform(&self, input: &ComponentInput<'_>) -> Result<Vec<Value>, ProcessingError>;
}

/// A component that accumulates a result over all rows it observes.
pub trait Analyzer: Component {
    /// Observe one row. Implementations must be thread-safe; rows arrive
    /// concurrently under the multi-threaded task runner.
    fn process_row(&self, input: &ComponentInput<'_>) -> Result<(), ProcessingError>;

    /// Produce the final result. Called exactly once per run, after `close`.
    fn result(&self) -> Box<dyn AnalyzerResult>;

    /// The reducer that merges partial results of this analyzer across
    /// distributed workers. `None` disallows distributed execution at compile
    /// time.
    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        None
    }
}
