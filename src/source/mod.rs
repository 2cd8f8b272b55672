//! Row source adapters.
//!
//! A [`RowSource`] abstracts a physical table as a sequence of rows. Sources
//! optionally accept pushed-down [`QueryConstraints`] (max rows, offset,
//! ordering, simple equality predicates); the [capabilities](RowSource::capabilities)
//! report tells the job compiler which constraint kinds a source can honor, so
//! that an inexpressible filter simply stays in the runtime chain.
//!
//! Two adapters ship with the engine:
//!
//! - [`DataSetSource`]: an in-memory [`crate::types::DataSet`]
//! - [`CsvSource`]: a CSV file read through the `csv` crate

pub mod csv;
pub mod dataset;

pub use csv::CsvSource;
pub use dataset::DataSetSource;

use crate::error::SourceError;
use crate::types::{Schema, Value};

/// Constraints pushed down into a source query.
///
/// All constraints default to "unconstrained". Semantics: equality predicates
/// are applied first, then ordering, then `offset`, then `max_rows`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConstraints {
    /// Maximum number of rows to yield.
    pub max_rows: Option<usize>,
    /// Number of leading rows to skip.
    pub offset: usize,
    /// Ascending order by this physical column.
    pub order_by: Option<String>,
    /// Only yield rows where each named column equals the given value.
    pub equals: Vec<(String, Value)>,
}

impl QueryConstraints {
    /// Constraints that select every row in source order.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if these constraints select every row in source order.
    pub fn is_unconstrained(&self) -> bool {
        self.max_rows.is_none()
            && self.offset == 0
            && self.order_by.is_none()
            && self.equals.is_empty()
    }

    /// The constraint kinds used by `self` that differ from `before`.
    ///
    /// Used by the job compiler to find out what a filter's push-down actually
    /// touched, so it can be checked against source capabilities.
    pub(crate) fn kinds_changed_from(&self, before: &QueryConstraints) -> Vec<ConstraintKind> {
        let mut kinds = Vec::new();
        if self.max_rows != before.max_rows {
            kinds.push(ConstraintKind::MaxRows);
        }
        if self.offset != before.offset {
            kinds.push(ConstraintKind::Offset);
        }
        if self.order_by != before.order_by {
            kinds.push(ConstraintKind::OrderBy);
        }
        if self.equals != before.equals {
            kinds.push(ConstraintKind::Equals);
        }
        kinds
    }
}

/// One kind of pushed-down constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    MaxRows,
    Offset,
    OrderBy,
    Equals,
}

/// Which constraint kinds a source can honor at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCapabilities {
    pub max_rows: bool,
    pub offset: bool,
    pub order_by: bool,
    pub equals: bool,
}

impl SourceCapabilities {
    /// A source that honors every constraint kind.
    pub fn all() -> Self {
        Self {
            max_rows: true,
            offset: true,
            order_by: true,
            equals: true,
        }
    }

    /// A source that honors no constraints at all.
    pub fn sequential_only() -> Self {
        Self {
            max_rows: false,
            offset: false,
            order_by: false,
            equals: false,
        }
    }

    /// Whether this source honors the given constraint kind.
    pub fn supports(&self, kind: ConstraintKind) -> bool {
        match kind {
            ConstraintKind::MaxRows => self.max_rows,
            ConstraintKind::Offset => self.offset,
            ConstraintKind::OrderBy => self.order_by,
            ConstraintKind::Equals => self.equals,
        }
    }
}

/// A physical table exposed as a sequence of rows.
///
/// The engine owns the source for the duration of a job and is the only
/// component allowed to block on it; fetching happens at stream boundaries,
/// never inside the row-processing hot path.
pub trait RowSource: Send + Sync {
    /// Name of the table this source originates from.
    fn table_name(&self) -> &str;

    /// Schema of the rows this source yields.
    fn schema(&self) -> &Schema;

    /// Which pushed-down constraint kinds this source can honor.
    fn capabilities(&self) -> SourceCapabilities;

    /// Open a stream of rows matching `constraints`.
    fn open(&self, constraints: &QueryConstraints) -> Result<Box<dyn RowStream>, SourceError>;

    /// Total number of rows, if cheaply known (used for progress reporting and
    /// partitioned runs).
    fn row_count_hint(&self) -> Option<usize> {
        None
    }
}

/// A stream of physical rows produced by [`RowSource::open`].
pub trait RowStream: Send {
    /// Yield the next row, or `None` at end of stream.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, SourceError>;
}

/// Applies equality predicates to a physical row.
pub(crate) fn matches_equals(
    schema: &Schema,
    row: &[Value],
    equals: &[(String, Value)],
) -> bool {
    equals.iter().all(|(column, expected)| {
        schema
            .index_of(column)
            .and_then(|idx| row.get(idx))
            .is_some_and(|actual| actual == expected)
    })
}
