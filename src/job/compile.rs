//! Graph validation, chain ordering and slot assignment.

use std::collections::{HashMap, HashSet};

use crate::component::ComponentHandle;
use crate::error::{CompileError, CompileResult};
use crate::job::builder::{AnalysisJobBuilder, CompileOptions, ComponentNode};
use crate::job::{
    optimizer, AnalysisJob, ComponentInstance, ComponentJob, ConsumerChain, InputColumn,
};
use crate::source::QueryConstraints;

pub(crate) fn compile(
    builder: &AnalysisJobBuilder,
    options: &CompileOptions,
) -> CompileResult<AnalysisJob> {
    if !builder.nodes.iter().any(|n| n.instance.is_analyzer()) {
        return Err(CompileError::NoResultProducers);
    }

    check_inputs(builder)?;
    check_requirements(builder)?;
    check_acyclic(builder)?;
    if options.distributed {
        check_reducers(builder)?;
    }
    let tables = resolve_tables(builder)?;

    let mut chains = Vec::new();
    for (source_idx, source) in builder.sources.iter().enumerate() {
        let group: Vec<&ComponentNode> = builder
            .nodes
            .iter()
            .filter(|n| tables[n.handle.index()] == source_idx)
            .collect();
        if group.is_empty() {
            continue;
        }

        let ordered = sort_consumers(&group);

        // Physical slots come from the source schema; each transformer gets a
        // contiguous block of virtual slots, assigned in chain order.
        let schema = source.schema();
        let physical_len = schema.fields.len();
        let mut next_slot = physical_len;
        let mut virtual_slots: HashMap<(ComponentHandle, usize), usize> = HashMap::new();
        for node in &ordered {
            if let ComponentInstance::Transformer(t) = &node.instance {
                let output_count = t.descriptor().output_columns.len();
                for index in 0..output_count {
                    virtual_slots.insert((node.handle, index), next_slot + index);
                }
                next_slot += output_count;
            }
        }

        let mut consumers = Vec::with_capacity(ordered.len());
        for node in &ordered {
            let input_slots = node
                .inputs
                .iter()
                .map(|input| match input {
                    InputColumn::Physical { column, .. } => {
                        schema.index_of(column).expect("validated above")
                    }
                    InputColumn::Virtual { producer, index } => {
                        virtual_slots[&(*producer, *index)]
                    }
                })
                .collect();
            consumers.push(ComponentJob {
                handle: node.handle,
                label: node.label.clone(),
                instance: node.instance.clone(),
                inputs: node.inputs.clone(),
                input_slots,
                output_slot_start: virtual_slots
                    .get(&(node.handle, 0))
                    .copied()
                    .unwrap_or(next_slot),
                requirement: node.requirement.clone(),
                fatal_on_error: node.fatal_on_error,
            });
        }

        let mut constraints = QueryConstraints::none();
        let mut pre_satisfied = Vec::new();
        if options.optimize_query {
            optimizer::optimize_chain(
                source.as_ref(),
                &mut consumers,
                &mut constraints,
                &mut pre_satisfied,
            );
        }

        chains.push(ConsumerChain {
            source: source.clone(),
            constraints,
            pre_satisfied,
            consumers,
            virtual_slot_count: next_slot - physical_len,
        });
    }

    Ok(AnalysisJob { chains })
}

fn check_inputs(builder: &AnalysisJobBuilder) -> CompileResult<()> {
    for node in &builder.nodes {
        for input in &node.inputs {
            match input {
                InputColumn::Physical { table, column } => {
                    let source = builder
                        .sources
                        .iter()
                        .find(|s| s.table_name() == table)
                        .ok_or_else(|| CompileError::UnresolvedInputColumn {
                            component: node.label.clone(),
                            column: input.to_string(),
                        })?;
                    if source.schema().index_of(column).is_none() {
                        return Err(CompileError::UnresolvedInputColumn {
                            component: node.label.clone(),
                            column: input.to_string(),
                        });
                    }
                }
                InputColumn::Virtual { producer, index } => {
                    let output_count = builder
                        .nodes
                        .get(producer.index())
                        .and_then(|p| match &p.instance {
                            ComponentInstance::Transformer(t) => {
                                Some(t.descriptor().output_columns.len())
                            }
                            _ => None,
                        })
                        .unwrap_or(0);
                    if *index >= output_count {
                        return Err(CompileError::UnresolvedInputColumn {
                            component: node.label.clone(),
                            column: input.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_requirements(builder: &AnalysisJobBuilder) -> CompileResult<()> {
    for node in &builder.nodes {
        let Some(requirement) = &node.requirement else {
            continue;
        };
        for term in requirement.terms() {
            let target = builder.nodes.get(term.filter.index()).ok_or_else(|| {
                CompileError::DanglingRequirement {
                    component: node.label.clone(),
                    reason: format!("filter #{} is not in the job", term.filter.index()),
                }
            })?;
            let ComponentInstance::Filter(filter) = &target.instance else {
                return Err(CompileError::DanglingRequirement {
                    component: node.label.clone(),
                    reason: format!("component '{}' is not a filter", target.label),
                });
            };
            if !filter.descriptor().outcomes.contains(&term.outcome) {
                return Err(CompileError::DanglingRequirement {
                    component: node.label.clone(),
                    reason: format!(
                        "filter '{}' never produces outcome {:?}",
                        target.label, term.outcome
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Handles a node depends on: producers of its virtual inputs and the filters
/// referenced by its requirement.
fn dependencies(node: &ComponentNode) -> Vec<ComponentHandle> {
    let mut deps = Vec::new();
    for input in &node.inputs {
        if let InputColumn::Virtual { producer, .. } = input {
            deps.push(*producer);
        }
    }
    if let Some(requirement) = &node.requirement {
        for term in requirement.terms() {
            deps.push(term.filter);
        }
    }
    deps
}

fn check_acyclic(builder: &AnalysisJobBuilder) -> CompileResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    fn visit(
        idx: usize,
        builder: &AnalysisJobBuilder,
        colors: &mut [Color],
    ) -> CompileResult<()> {
        colors[idx] = Color::Gray;
        for dep in dependencies(&builder.nodes[idx]) {
            let dep_idx = dep.index();
            if dep_idx >= builder.nodes.len() {
                continue;
            }
            match colors[dep_idx] {
                Color::Gray => {
                    return Err(CompileError::CyclicDependency {
                        component: builder.nodes[dep_idx].label.clone(),
                    });
                }
                Color::White => visit(dep_idx, builder, colors)?,
                Color::Black => {}
            }
        }
        colors[idx] = Color::Black;
        Ok(())
    }

    let mut colors = vec![Color::White; builder.nodes.len()];
    for idx in 0..builder.nodes.len() {
        if colors[idx] == Color::White {
            visit(idx, builder, &mut colors)?;
        }
    }
    Ok(())
}

fn check_reducers(builder: &AnalysisJobBuilder) -> CompileResult<()> {
    for node in &builder.nodes {
        if let ComponentInstance::Analyzer(analyzer) = &node.instance {
            if analyzer.reducer().is_none() {
                return Err(CompileError::MissingReducer {
                    component: node.label.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Resolve the originating source table of every node: the union of the
/// tables of its physical inputs, its virtual-input producers and its
/// requirement filters must name exactly one table. Nodes with no inputs at
/// all bind to the only registered source, or fail as ambiguous.
fn resolve_tables(builder: &AnalysisJobBuilder) -> CompileResult<Vec<usize>> {
    fn tables_of(
        idx: usize,
        builder: &AnalysisJobBuilder,
        memo: &mut Vec<Option<HashSet<usize>>>,
    ) -> HashSet<usize> {
        if let Some(cached) = &memo[idx] {
            return cached.clone();
        }
        let node = &builder.nodes[idx];
        let mut tables = HashSet::new();
        for input in &node.inputs {
            if let InputColumn::Physical { table, .. } = input {
                if let Some(pos) = builder
                    .sources
                    .iter()
                    .position(|s| s.table_name() == table)
                {
                    tables.insert(pos);
                }
            }
        }
        for dep in dependencies(node) {
            if dep.index() < builder.nodes.len() {
                tables.extend(tables_of(dep.index(), builder, memo));
            }
        }
        memo[idx] = Some(tables.clone());
        tables
    }

    let mut memo = vec![None; builder.nodes.len()];
    let mut resolved = Vec::with_capacity(builder.nodes.len());
    for (idx, node) in builder.nodes.iter().enumerate() {
        let tables = tables_of(idx, builder, &mut memo);
        match tables.len() {
            1 => resolved.push(*tables.iter().next().expect("len checked")),
            0 if builder.sources.len() == 1 => resolved.push(0),
            _ => {
                let mut names: Vec<String> = if tables.is_empty() {
                    builder
                        .sources
                        .iter()
                        .map(|s| s.table_name().to_string())
                        .collect()
                } else {
                    tables
                        .iter()
                        .map(|&pos| builder.sources[pos].table_name().to_string())
                        .collect()
                };
                names.sort();
                return Err(CompileError::AmbiguousSourceTable {
                    component: node.label.clone(),
                    tables: names,
                });
            }
        }
    }
    Ok(resolved)
}

/// Stable topological sort: repeatedly emit, in insertion order, the first
/// node whose in-group dependencies have all been emitted. Ties within a
/// dependency rank therefore resolve to insertion order, making compilation
/// reproducible.
fn sort_consumers<'a>(group: &[&'a ComponentNode]) -> Vec<&'a ComponentNode> {
    let in_group: HashSet<usize> = group.iter().map(|n| n.handle.index()).collect();
    let mut emitted: HashSet<usize> = HashSet::new();
    let mut ordered = Vec::with_capacity(group.len());

    while ordered.len() < group.len() {
        let before = ordered.len();
        for node in group {
            if emitted.contains(&node.handle.index()) {
                continue;
            }
            let ready = dependencies(node)
                .iter()
                .filter(|dep| in_group.contains(&dep.index()))
                .all(|dep| emitted.contains(&dep.index()));
            if ready {
                emitted.insert(node.handle.index());
                ordered.push(*node);
            }
        }
        // Cycles are rejected before sorting; a full pass always emits.
        debug_assert!(ordered.len() > before, "unsortable consumer group");
        if ordered.len() == before {
            break;
        }
    }
    ordered
}
