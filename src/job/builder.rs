//! Mutable job assembly.

use std::sync::Arc;

use crate::component::{Analyzer, ComponentHandle, Filter, Requirement, Transformer};
use crate::error::CompileResult;
use crate::job::{compile, AnalysisJob, ComponentInstance, InputColumn};
use crate::source::RowSource;

/// Options controlling [`AnalysisJobBuilder::compile_with`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Apply query push-down optimization. Disabling forces every filter to
    /// run in the chain (used to verify push-down equivalence).
    pub optimize_query: bool,
    /// Compile for distributed execution: every analyzer must declare a
    /// reducer, enforced at compile time.
    pub distributed: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize_query: true,
            distributed: false,
        }
    }
}

#[derive(Clone)]
pub(crate) struct ComponentNode {
    pub(crate) handle: ComponentHandle,
    pub(crate) label: String,
    pub(crate) instance: ComponentInstance,
    pub(crate) inputs: Vec<InputColumn>,
    pub(crate) requirement: Option<Requirement>,
    pub(crate) fatal_on_error: bool,
}

/// Assembles a job graph: row sources, components, input bindings and
/// requirements. [`compile`](Self::compile) validates the graph and freezes it
/// into an [`AnalysisJob`]; the builder stays usable afterwards, and compiling
/// twice yields identically-ordered chains.
#[derive(Default)]
pub struct AnalysisJobBuilder {
    pub(crate) sources: Vec<Arc<dyn RowSource>>,
    pub(crate) nodes: Vec<ComponentNode>,
}

impl AnalysisJobBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an originating source table.
    pub fn add_source(&mut self, source: impl RowSource + 'static) -> &mut Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Add a filter with its input-column bindings.
    pub fn add_filter(
        &mut self,
        filter: impl Filter + 'static,
        inputs: Vec<InputColumn>,
    ) -> ComponentHandle {
        self.add_node(ComponentInstance::Filter(Arc::new(filter)), inputs)
    }

    /// Add a transformer with its input-column bindings.
    pub fn add_transformer(
        &mut self,
        transformer: impl Transformer + 'static,
        inputs: Vec<InputColumn>,
    ) -> ComponentHandle {
        self.add_node(ComponentInstance::Transformer(Arc::new(transformer)), inputs)
    }

    /// Add an analyzer with its input-column bindings.
    pub fn add_analyzer(
        &mut self,
        analyzer: impl Analyzer + 'static,
        inputs: Vec<InputColumn>,
    ) -> ComponentHandle {
        self.add_node(ComponentInstance::Analyzer(Arc::new(analyzer)), inputs)
    }

    fn add_node(&mut self, instance: ComponentInstance, inputs: Vec<InputColumn>) -> ComponentHandle {
        let handle = ComponentHandle(self.nodes.len());
        let label = format!(
            "{}#{}",
            instance.as_component().descriptor().name,
            handle.index()
        );
        self.nodes.push(ComponentNode {
            handle,
            label,
            instance,
            inputs,
            requirement: None,
            fatal_on_error: false,
        });
        handle
    }

    /// Gate `handle` behind a requirement over upstream filter outcomes.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was not returned by this builder.
    pub fn set_requirement(&mut self, handle: ComponentHandle, requirement: Requirement) -> &mut Self {
        self.node_mut(handle).requirement = Some(requirement);
        self
    }

    /// Replace the input-column bindings of `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was not returned by this builder.
    pub fn set_inputs(&mut self, handle: ComponentHandle, inputs: Vec<InputColumn>) -> &mut Self {
        self.node_mut(handle).inputs = inputs;
        self
    }

    /// Mark `handle` as fatal-on-error: a processing error in it aborts the
    /// whole job instead of being recovered.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was not returned by this builder.
    pub fn set_fatal_on_error(&mut self, handle: ComponentHandle, fatal: bool) -> &mut Self {
        self.node_mut(handle).fatal_on_error = fatal;
        self
    }

    fn node_mut(&mut self, handle: ComponentHandle) -> &mut ComponentNode {
        self.nodes
            .get_mut(handle.index())
            .unwrap_or_else(|| panic!("unknown component handle #{}", handle.index()))
    }

    /// Compile with default options (push-down enabled, local execution).
    pub fn compile(&self) -> CompileResult<AnalysisJob> {
        self.compile_with(&CompileOptions::default())
    }

    /// Validate the graph and freeze it into an [`AnalysisJob`].
    ///
    /// All compile-time checks run in this one pass; there is no partial
    /// compilation. No row source is opened here.
    pub fn compile_with(&self, options: &CompileOptions) -> CompileResult<AnalysisJob> {
        compile::compile(self, options)
    }
}
