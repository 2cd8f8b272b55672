//! Core data model: schemas, values, in-memory datasets and the per-row state
//! threaded through a consumer chain.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Logical data type for a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the shape of a source table's rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single typed value in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Returns the numeric interpretation of this value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `true` if this value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Total order over values, used by order-by push-down and for
    /// deterministic sample ordering.
    ///
    /// Nulls sort first. Numeric values (`Int64`/`Float64`) compare
    /// numerically with each other. Otherwise values compare within their own
    /// kind, and across kinds by kind rank (null < numeric < bool < string).
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Utf8(a), Value::Utf8(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => kind_rank(self).cmp(&kind_rank(other)),
            },
        }
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Int64(_) | Value::Float64(_) => 1,
        Value::Bool(_) => 2,
        Value::Utf8(_) => 3,
    }
}

/// In-memory tabular dataset, usable as a row source via
/// [`crate::source::DataSetSource`].
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`]
/// fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// The mutable per-row state threaded through a consumer chain.
///
/// The first `physical_len` slots hold the values fetched from the row source;
/// the remaining slots are virtual columns, written by transformers as the row
/// travels down the chain. A virtual slot reads as [`Value::Null`] until its
/// producer has run for this row.
#[derive(Debug, Clone)]
pub struct InputRow {
    id: u64,
    values: Vec<Value>,
    produced: Vec<bool>,
    physical_len: usize,
}

impl InputRow {
    /// Create a row from physical source values, reserving `virtual_slots`
    /// additional slots for transformer output.
    pub fn new(id: u64, physical: Vec<Value>, virtual_slots: usize) -> Self {
        let physical_len = physical.len();
        let mut values = physical;
        values.resize(physical_len + virtual_slots, Value::Null);
        Self {
            id,
            values,
            produced: vec![false; virtual_slots],
            physical_len,
        }
    }

    /// Sequential row number, assigned in source order starting at 0.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read the value at `slot`.
    pub fn value(&self, slot: usize) -> &Value {
        &self.values[slot]
    }

    /// All physical source values of this row.
    pub fn physical_values(&self) -> &[Value] {
        &self.values[..self.physical_len]
    }

    /// Whether the virtual slot at `slot` has been written for this row.
    ///
    /// Physical slots are always produced.
    pub fn is_produced(&self, slot: usize) -> bool {
        slot < self.physical_len || self.produced[slot - self.physical_len]
    }

    /// Write transformer output into the given virtual slots.
    pub(crate) fn write_virtual(&mut self, first_slot: usize, output: Vec<Value>) {
        for (offset, value) in output.into_iter().enumerate() {
            let slot = first_slot + offset;
            self.values[slot] = value;
            self.produced[slot - self.physical_len] = true;
        }
    }
}
