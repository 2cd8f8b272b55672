//! Query push-down optimization.
//!
//! Walks the head of a consumer chain and folds eligible filters into the
//! source query instead of running them per row. The rule is conservative:
//! optimization must never change which rows any remaining runtime consumer
//! observes, so anything doubtful stays in the chain.

use std::collections::HashSet;

use crate::component::{ComponentHandle, Outcome, OutcomeRef};
use crate::job::{ComponentInstance, ComponentJob, InputColumn};
use crate::source::{QueryConstraints, RowSource};

/// Fold the leading run of eligible filters into `constraints`, removing them
/// from `consumers` and recording their outcomes as pre-satisfied.
///
/// A filter is eligible when:
/// - its descriptor declares the optimizable contract and all its inputs are
///   physical columns,
/// - its own requirement (if any) only references already-pushed outcomes,
/// - exactly one of its outcomes absorbs the chain suffix: every later
///   consumer must be transitively tied to that outcome, so no runtime
///   consumer can observe a row the optimized query would not fetch,
/// - the filter can express that outcome as constraints the source supports.
///
/// The scan stops at the first ineligible consumer; pushed filters are always
/// a prefix of the chain.
pub(crate) fn optimize_chain(
    source: &dyn RowSource,
    consumers: &mut Vec<ComponentJob>,
    constraints: &mut QueryConstraints,
    pre_satisfied: &mut Vec<OutcomeRef>,
) {
    let capabilities = source.capabilities();
    let mut pushed: Vec<OutcomeRef> = Vec::new();

    for index in 0..consumers.len() {
        let consumer = &consumers[index];
        let ComponentInstance::Filter(filter) = &consumer.instance else {
            break;
        };
        let descriptor = filter.descriptor();
        if !descriptor.query_optimizable {
            break;
        }

        let input_columns: Option<Vec<String>> = consumer
            .inputs()
            .iter()
            .map(|input| match input {
                InputColumn::Physical { column, .. } => Some(column.clone()),
                InputColumn::Virtual { .. } => None,
            })
            .collect();
        let Some(input_columns) = input_columns else {
            break;
        };

        // A pushed filter applies to every fetched row, so its own gate must
        // already hold for every fetched row.
        let gate_ok = consumer.requirement().is_none_or(|requirement| {
            requirement.terms().iter().all(|term| pushed.contains(term))
        });
        if !gate_ok {
            break;
        }

        let mut chosen: Option<(Outcome, QueryConstraints)> = None;
        let mut multiple = false;
        for outcome in &descriptor.outcomes {
            if !suffix_absorbed(consumers, index, consumer.handle(), outcome, &pushed) {
                continue;
            }
            let mut trial = constraints.clone();
            if !filter.optimize_query(outcome, &input_columns, &mut trial) {
                continue;
            }
            let supported = trial
                .kinds_changed_from(constraints)
                .iter()
                .all(|kind| capabilities.supports(*kind));
            if !supported {
                continue;
            }
            if chosen.is_some() {
                // Two pushable outcomes of one filter cannot both hold.
                multiple = true;
                break;
            }
            chosen = Some((outcome.clone(), trial));
        }

        let Some((outcome, optimized)) = chosen else {
            break;
        };
        if multiple {
            break;
        }

        *constraints = optimized;
        pushed.push(OutcomeRef::new(consumer.handle(), outcome));
    }

    consumers.drain(..pushed.len());
    *pre_satisfied = pushed;
}

/// Check that removing the filter at `index` with `outcome` pushed into the
/// query leaves every later consumer observing the same rows.
///
/// Walks the suffix keeping two satisfied sets: outcome terms that are
/// determinable for fetched rows, and virtual columns produced inside the
/// absorbed region. Each later consumer must be dependent on the satisfied
/// sets (a fully independent consumer would observe rows the optimized query
/// no longer fetches) and must not reference anything outside them.
fn suffix_absorbed(
    consumers: &[ComponentJob],
    index: usize,
    filter: ComponentHandle,
    outcome: &Outcome,
    pushed: &[OutcomeRef],
) -> bool {
    let mut satisfied_terms: HashSet<OutcomeRef> = pushed.iter().cloned().collect();
    satisfied_terms.insert(OutcomeRef::new(filter, outcome.clone()));
    let mut satisfied_columns: HashSet<(ComponentHandle, usize)> = HashSet::new();

    for consumer in &consumers[index + 1..] {
        let mut dependent = false;

        if let Some(requirement) = consumer.requirement() {
            for term in requirement.terms() {
                if satisfied_terms.contains(term) {
                    dependent = true;
                } else {
                    return false;
                }
            }
        }
        for input in consumer.inputs() {
            if let InputColumn::Virtual { producer, index } = input {
                if satisfied_columns.contains(&(*producer, *index)) {
                    dependent = true;
                } else {
                    return false;
                }
            }
        }
        if !dependent {
            return false;
        }

        // Accepted: rows reaching this consumer are exactly the optimized
        // fetch, so its outcomes and outputs become determinable in turn.
        match &consumer.instance {
            ComponentInstance::Filter(f) => {
                for o in &f.descriptor().outcomes {
                    satisfied_terms.insert(OutcomeRef::new(consumer.handle(), o.clone()));
                }
            }
            ComponentInstance::Transformer(t) => {
                for k in 0..t.descriptor().output_columns.len() {
                    satisfied_columns.insert((consumer.handle(), k));
                }
            }
            ComponentInstance::Analyzer(_) => {}
        }
    }
    true
}
