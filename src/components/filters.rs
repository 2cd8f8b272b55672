//! Built-in filters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::component::{
    Component, ComponentDescriptor, ComponentInput, ExecutionContext, Filter, Outcome,
    PropertyDescriptor,
};
use crate::error::ProcessingError;
use crate::source::QueryConstraints;
use crate::types::{DataType, Value};

/// Passes the first `max_rows` rows it sees (after skipping `offset` rows);
/// every other row is invalid.
///
/// When its valid branch absorbs the rest of the chain, the whole filter folds
/// into the source query as `offset`/`max_rows` constraints.
pub struct MaxRowsFilter {
    descriptor: ComponentDescriptor,
    max_rows: u64,
    offset: u64,
    seen: AtomicU64,
}

impl MaxRowsFilter {
    /// A filter admitting the first `max_rows` rows.
    pub fn new(max_rows: u64) -> Self {
        Self::with_offset(max_rows, 0)
    }

    /// A filter admitting `max_rows` rows after skipping the first `offset`.
    pub fn with_offset(max_rows: u64, offset: u64) -> Self {
        Self {
            descriptor: max_rows_descriptor().clone(),
            max_rows,
            offset,
            seen: AtomicU64::new(0),
        }
    }
}

fn max_rows_descriptor() -> &'static ComponentDescriptor {
    static DESCRIPTOR: OnceLock<ComponentDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        ComponentDescriptor::new("max_rows")
            .with_properties(vec![
                PropertyDescriptor::required("max_rows", DataType::Int64),
                PropertyDescriptor::optional("offset", DataType::Int64, Value::Int64(0)),
            ])
            .with_outcomes(vec![Outcome::Valid, Outcome::Invalid])
            .query_optimizable()
    })
}

impl Component for MaxRowsFilter {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    fn configure(&mut self, properties: &BTreeMap<String, Value>) -> Result<(), ProcessingError> {
        if let Some(value) = properties.get("max_rows") {
            self.max_rows = require_u64(value, "max_rows")?;
        }
        if let Some(value) = properties.get("offset") {
            self.offset = require_u64(value, "offset")?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ProcessingError> {
        if self.max_rows == 0 {
            return Err(ProcessingError::new("max_rows must be at least 1"));
        }
        Ok(())
    }

    // The row window restarts with every run.
    fn initialize(&self, _ctx: &ExecutionContext) {
        self.seen.store(0, Ordering::SeqCst);
    }
}

impl Filter for MaxRowsFilter {
    fn categorize(&self, _input: &ComponentInput<'_>) -> Result<Outcome, ProcessingError> {
        let seen = self.seen.fetch_add(1, Ordering::SeqCst);
        if seen >= self.offset && seen < self.offset + self.max_rows {
            Ok(Outcome::Valid)
        } else {
            Ok(Outcome::Invalid)
        }
    }

    fn optimize_query(
        &self,
        outcome: &Outcome,
        _input_columns: &[String],
        constraints: &mut QueryConstraints,
    ) -> bool {
        if *outcome != Outcome::Valid {
            return false;
        }
        constraints.offset += self.offset as usize;
        let max_rows = self.max_rows as usize;
        constraints.max_rows = Some(match constraints.max_rows {
            Some(existing) => existing.min(max_rows),
            None => max_rows,
        });
        true
    }
}

fn require_u64(value: &Value, property: &str) -> Result<u64, ProcessingError> {
    match value {
        Value::Int64(v) if *v >= 0 => Ok(*v as u64),
        other => Err(ProcessingError::new(format!(
            "property '{property}' must be a non-negative integer, got {other:?}"
        ))),
    }
}

/// Splits rows on equality of its single input column against a fixed value.
///
/// The valid branch is expressible as an equality predicate, so the filter is
/// query-optimizable against sources that support equality push-down.
pub struct EqualsFilter {
    descriptor: ComponentDescriptor,
    value: Value,
}

impl EqualsFilter {
    /// A filter whose valid branch holds rows where the input equals `value`.
    pub fn new(value: Value) -> Self {
        static DESCRIPTOR: OnceLock<ComponentDescriptor> = OnceLock::new();
        let descriptor = DESCRIPTOR.get_or_init(|| {
            ComponentDescriptor::new("equals")
                .with_outcomes(vec![Outcome::Valid, Outcome::Invalid])
                .query_optimizable()
        });
        Self {
            descriptor: descriptor.clone(),
            value,
        }
    }
}

impl Component for EqualsFilter {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }
}

impl Filter for EqualsFilter {
    fn categorize(&self, input: &ComponentInput<'_>) -> Result<Outcome, ProcessingError> {
        if *input.value(0) == self.value {
            Ok(Outcome::Valid)
        } else {
            Ok(Outcome::Invalid)
        }
    }

    fn optimize_query(
        &self,
        outcome: &Outcome,
        input_columns: &[String],
        constraints: &mut QueryConstraints,
    ) -> bool {
        if *outcome != Outcome::Valid || input_columns.is_empty() {
            return false;
        }
        constraints
            .equals
            .push((input_columns[0].clone(), self.value.clone()));
        true
    }
}

/// Splits rows on whether the input column is null.
pub struct NotNullFilter {
    descriptor: ComponentDescriptor,
}

impl NotNullFilter {
    /// A filter whose valid branch holds rows with a non-null input.
    pub fn new() -> Self {
        static DESCRIPTOR: OnceLock<ComponentDescriptor> = OnceLock::new();
        let descriptor = DESCRIPTOR.get_or_init(|| {
            ComponentDescriptor::new("not_null")
                .with_outcomes(vec![Outcome::Valid, Outcome::Invalid])
        });
        Self {
            descriptor: descriptor.clone(),
        }
    }
}

impl Default for NotNullFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for NotNullFilter {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }
}

impl Filter for NotNullFilter {
    fn categorize(&self, input: &ComponentInput<'_>) -> Result<Outcome, ProcessingError> {
        if input.value(0).is_null() {
            Ok(Outcome::Invalid)
        } else {
            Ok(Outcome::Valid)
        }
    }
}
