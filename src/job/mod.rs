//! Job graph model and compiler.
//!
//! A job is assembled through an [`AnalysisJobBuilder`]: register row sources,
//! add components with their input-column bindings, optionally gate them with
//! [`Requirement`](crate::component::Requirement)s, then [`compile`](AnalysisJobBuilder::compile)
//! into an immutable [`AnalysisJob`] — one ordered [`ConsumerChain`] per
//! originating source table, with query push-down already folded into each
//! chain's source constraints.

pub mod builder;
mod compile;
mod optimizer;

pub use builder::{AnalysisJobBuilder, CompileOptions};

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::component::{
    Analyzer, Component, ComponentHandle, Filter, OutcomeRef, Requirement, Transformer,
};
use crate::source::{QueryConstraints, RowSource};

/// An input column declared by a component when it is added to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputColumn {
    /// A column of a registered source table.
    Physical { table: String, column: String },
    /// An output column of a transformer already in the job.
    Virtual {
        producer: ComponentHandle,
        index: usize,
    },
}

impl InputColumn {
    /// A physical source column.
    pub fn physical(table: impl Into<String>, column: impl Into<String>) -> Self {
        InputColumn::Physical {
            table: table.into(),
            column: column.into(),
        }
    }

    /// The `index`-th output column of the transformer added as `producer`.
    pub fn output_of(producer: ComponentHandle, index: usize) -> Self {
        InputColumn::Virtual { producer, index }
    }
}

impl fmt::Display for InputColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputColumn::Physical { table, column } => write!(f, "{table}.{column}"),
            InputColumn::Virtual { producer, index } => {
                write!(f, "output {index} of component #{}", producer.index())
            }
        }
    }
}

/// A component instance, by kind.
#[derive(Clone)]
pub enum ComponentInstance {
    Filter(Arc<dyn Filter>),
    Transformer(Arc<dyn Transformer>),
    Analyzer(Arc<dyn Analyzer>),
}

impl ComponentInstance {
    /// The shared lifecycle view of this instance.
    pub fn as_component(&self) -> &dyn Component {
        match self {
            ComponentInstance::Filter(c) => c.as_ref(),
            ComponentInstance::Transformer(c) => c.as_ref(),
            ComponentInstance::Analyzer(c) => c.as_ref(),
        }
    }

    /// Returns `true` for analyzer instances.
    pub fn is_analyzer(&self) -> bool {
        matches!(self, ComponentInstance::Analyzer(_))
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ComponentInstance::Filter(_) => "Filter",
            ComponentInstance::Transformer(_) => "Transformer",
            ComponentInstance::Analyzer(_) => "Analyzer",
        };
        write!(f, "{kind}({})", self.as_component().descriptor().name)
    }
}

/// A compiled, frozen node of the job graph: a component instance with its
/// resolved input slots, output slots and requirement. Never mutated during
/// execution.
#[derive(Debug, Clone)]
pub struct ComponentJob {
    handle: ComponentHandle,
    label: String,
    instance: ComponentInstance,
    inputs: Vec<InputColumn>,
    input_slots: Vec<usize>,
    output_slot_start: usize,
    requirement: Option<Requirement>,
    fatal_on_error: bool,
}

impl ComponentJob {
    /// The handle assigned to this component at insertion.
    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }

    /// Identity used in error messages and error-count summaries,
    /// e.g. `"equals#1"`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The component instance.
    pub fn instance(&self) -> &ComponentInstance {
        &self.instance
    }

    /// The declared input columns, as added to the builder.
    pub fn inputs(&self) -> &[InputColumn] {
        &self.inputs
    }

    /// Resolved row slots of the declared input columns, positionally.
    pub fn input_slots(&self) -> &[usize] {
        &self.input_slots
    }

    /// Resolved row slots this component writes (empty unless it is a
    /// transformer).
    pub fn output_slots(&self) -> Range<usize> {
        let count = self
            .instance
            .as_component()
            .descriptor()
            .output_columns
            .len();
        self.output_slot_start..self.output_slot_start + count
    }

    /// The requirement gating this component, if any.
    pub fn requirement(&self) -> Option<&Requirement> {
        self.requirement.as_ref()
    }

    /// Whether a processing error in this component aborts the whole job.
    pub fn fatal_on_error(&self) -> bool {
        self.fatal_on_error
    }
}

/// The ordered sequence of [`ComponentJob`]s derived for one originating
/// source table, plus the (possibly push-down-optimized) source constraints.
pub struct ConsumerChain {
    source: Arc<dyn RowSource>,
    constraints: QueryConstraints,
    pre_satisfied: Vec<OutcomeRef>,
    consumers: Vec<ComponentJob>,
    virtual_slot_count: usize,
}

impl ConsumerChain {
    /// The row source this chain consumes from.
    pub fn source(&self) -> &Arc<dyn RowSource> {
        &self.source
    }

    /// The source constraints, after push-down optimization.
    pub fn constraints(&self) -> &QueryConstraints {
        &self.constraints
    }

    /// Outcomes that hold for every fetched row because their filter was
    /// folded into the source query.
    pub fn pre_satisfied(&self) -> &[OutcomeRef] {
        &self.pre_satisfied
    }

    /// The consumers of this chain, in processing order.
    pub fn consumers(&self) -> &[ComponentJob] {
        &self.consumers
    }

    /// Number of virtual slots appended to each row of this chain.
    pub fn virtual_slot_count(&self) -> usize {
        self.virtual_slot_count
    }

    /// The consumer labels in processing order. Compiling the same builder
    /// twice yields identical orderings.
    pub fn consumer_labels(&self) -> Vec<&str> {
        self.consumers.iter().map(ComponentJob::label).collect()
    }
}

impl fmt::Debug for ConsumerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerChain")
            .field("table", &self.source.table_name())
            .field("constraints", &self.constraints)
            .field("pre_satisfied", &self.pre_satisfied)
            .field("consumers", &self.consumer_labels())
            .finish()
    }
}

/// The compiled, immutable aggregate of a job: one chain per originating
/// source table. Requires no locking once compiled.
#[derive(Debug)]
pub struct AnalysisJob {
    chains: Vec<ConsumerChain>,
}

impl AnalysisJob {
    /// The consumer chains, in source registration order.
    pub fn chains(&self) -> &[ConsumerChain] {
        &self.chains
    }

    /// Every analyzer in the job, with its handle and identity label.
    pub fn analyzers(&self) -> Vec<(ComponentHandle, String, Arc<dyn Analyzer>)> {
        let mut analyzers = Vec::new();
        for chain in &self.chains {
            for consumer in &chain.consumers {
                if let ComponentInstance::Analyzer(analyzer) = &consumer.instance {
                    analyzers.push((
                        consumer.handle,
                        consumer.label.clone(),
                        Arc::clone(analyzer),
                    ));
                }
            }
        }
        analyzers
    }
}
