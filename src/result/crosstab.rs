//! Two-dimensional aggregation tables.

use std::collections::BTreeMap;

use serde::Serialize;

/// A two-dimensional table of numeric cells, keyed by row and column category
/// names. Ordered maps keep rendering and serialization deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Crosstab {
    cells: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Crosstab {
    /// An empty crosstab.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the cell at (`row`, `column`), creating it at zero if
    /// absent.
    pub fn add(&mut self, row: &str, column: &str, amount: f64) {
        *self
            .cells
            .entry(row.to_string())
            .or_default()
            .entry(column.to_string())
            .or_insert(0.0) += amount;
    }

    /// The value of the cell at (`row`, `column`), or 0 if absent.
    pub fn get(&self, row: &str, column: &str) -> f64 {
        self.cells
            .get(row)
            .and_then(|columns| columns.get(column))
            .copied()
            .unwrap_or(0.0)
    }

    /// Merge another crosstab into this one, cell by cell, summing values.
    pub fn merge(&mut self, other: &Crosstab) {
        for (row, columns) in &other.cells {
            for (column, value) in columns {
                self.add(row, column, *value);
            }
        }
    }

    /// Sum of all cells.
    pub fn total(&self) -> f64 {
        self.cells
            .values()
            .flat_map(|columns| columns.values())
            .sum()
    }

    /// Iterate all cells as (row, column, value), in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.cells.iter().flat_map(|(row, columns)| {
            columns
                .iter()
                .map(move |(column, value)| (row.as_str(), column.as_str(), *value))
        })
    }
}
