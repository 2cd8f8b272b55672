//! Filter outcomes and component requirements.

use serde::{Deserialize, Serialize};

/// Opaque id of a component within one job, assigned at insertion by the
/// [`crate::job::AnalysisJobBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentHandle(pub(crate) usize);

impl ComponentHandle {
    /// Zero-based insertion index of the component in its builder.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A categorization a filter assigns to a row.
///
/// Equality is structural: two outcomes are the same requirement target if
/// and only if they are the same variant (and category name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The row passed the filter.
    Valid,
    /// The row failed the filter.
    Invalid,
    /// A named category, for filters with more than two branches.
    Category(String),
}

impl Outcome {
    /// A named category outcome.
    pub fn category(name: impl Into<String>) -> Self {
        Outcome::Category(name.into())
    }
}

/// One term of a [`Requirement`]: a specific outcome of a specific filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutcomeRef {
    /// The filter whose outcome is required.
    pub filter: ComponentHandle,
    /// The outcome value that must have been recorded for the row.
    pub outcome: Outcome,
}

impl OutcomeRef {
    /// Create a term requiring `filter` to have categorized the row as
    /// `outcome`.
    pub fn new(filter: ComponentHandle, outcome: Outcome) -> Self {
        Self { filter, outcome }
    }
}

/// A predicate over upstream filter outcomes that gates whether a component
/// processes a given row.
///
/// A term referencing a filter that recorded no outcome for the row is never
/// satisfied; rows that bypassed a filter are excluded from every branch that
/// requires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// A single outcome term.
    Outcome(OutcomeRef),
    /// All terms must hold.
    AllOf(Vec<OutcomeRef>),
    /// At least one term must hold.
    AnyOf(Vec<OutcomeRef>),
}

impl Requirement {
    /// Require a single filter outcome.
    pub fn outcome(filter: ComponentHandle, outcome: Outcome) -> Self {
        Requirement::Outcome(OutcomeRef::new(filter, outcome))
    }

    /// All referenced terms, in declaration order.
    pub fn terms(&self) -> &[OutcomeRef] {
        match self {
            Requirement::Outcome(term) => std::slice::from_ref(term),
            Requirement::AllOf(terms) | Requirement::AnyOf(terms) => terms,
        }
    }

    /// Evaluate this requirement against the outcomes recorded for a row.
    pub fn is_satisfied(&self, outcomes: &FilterOutcomes) -> bool {
        let holds = |term: &OutcomeRef| outcomes.get(term.filter) == Some(&term.outcome);
        match self {
            Requirement::Outcome(term) => holds(term),
            Requirement::AllOf(terms) => terms.iter().all(holds),
            Requirement::AnyOf(terms) => terms.iter().any(holds),
        }
    }
}

/// The set of filter outcomes recorded for one row so far.
///
/// Seeded with the outcomes of filters that were eliminated by query
/// push-down (those hold for every fetched row by construction).
#[derive(Debug, Clone, Default)]
pub struct FilterOutcomes {
    entries: Vec<(ComponentHandle, Outcome)>,
}

impl FilterOutcomes {
    /// An empty outcome set.
    pub fn new() -> Self {
        Self::default()
    }

    /// An outcome set pre-seeded with always-satisfied terms.
    pub fn with_pre_satisfied(pre_satisfied: &[OutcomeRef]) -> Self {
        Self {
            entries: pre_satisfied
                .iter()
                .map(|term| (term.filter, term.outcome.clone()))
                .collect(),
        }
    }

    /// Record the outcome a filter assigned to this row.
    pub fn record(&mut self, filter: ComponentHandle, outcome: Outcome) {
        self.entries.push((filter, outcome));
    }

    /// The outcome recorded for `filter`, if any.
    pub fn get(&self, filter: ComponentHandle) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|(handle, _)| *handle == filter)
            .map(|(_, outcome)| outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::{ComponentHandle, FilterOutcomes, Outcome, OutcomeRef, Requirement};

    #[test]
    fn requirement_without_recorded_outcome_is_not_satisfied() {
        let filter = ComponentHandle(0);
        let requirement = Requirement::outcome(filter, Outcome::Valid);
        assert!(!requirement.is_satisfied(&FilterOutcomes::new()));

        let mut outcomes = FilterOutcomes::new();
        outcomes.record(filter, Outcome::Invalid);
        assert!(!requirement.is_satisfied(&outcomes));

        outcomes.record(filter, Outcome::Valid);
        // First recorded outcome wins; a filter records once per row.
        assert!(!requirement.is_satisfied(&outcomes));
    }

    #[test]
    fn all_of_and_any_of_combinators() {
        let f0 = ComponentHandle(0);
        let f1 = ComponentHandle(1);
        let mut outcomes = FilterOutcomes::new();
        outcomes.record(f0, Outcome::Valid);

        let both = Requirement::AllOf(vec![
            OutcomeRef::new(f0, Outcome::Valid),
            OutcomeRef::new(f1, Outcome::Valid),
        ]);
        let either = Requirement::AnyOf(vec![
            OutcomeRef::new(f0, Outcome::Valid),
            OutcomeRef::new(f1, Outcome::Valid),
        ]);
        assert!(!both.is_satisfied(&outcomes));
        assert!(either.is_satisfied(&outcomes));

        outcomes.record(f1, Outcome::Valid);
        assert!(both.is_satisfied(&outcomes));
    }

    #[test]
    fn pre_satisfied_outcomes_seed_the_set() {
        let filter = ComponentHandle(3);
        let outcomes =
            FilterOutcomes::with_pre_satisfied(&[OutcomeRef::new(filter, Outcome::Valid)]);
        assert!(Requirement::outcome(filter, Outcome::Valid).is_satisfied(&outcomes));
    }

    #[test]
    fn category_outcomes_compare_structurally() {
        assert_eq!(Outcome::category("UNIQUE"), Outcome::Category("UNIQUE".to_string()));
        assert_ne!(Outcome::category("UNIQUE"), Outcome::category("DUPLICATE"));
    }
}
