//! CSV-backed row source.

use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::source::{matches_equals, QueryConstraints, RowSource, RowStream, SourceCapabilities};
use crate::types::{DataType, Schema, Value};

/// A [`RowSource`] over a CSV file.
///
/// Rules:
///
/// - The CSV must have headers.
/// - Headers must contain all schema fields (order can differ).
/// - Each value is parsed according to the schema field type; empty cells map
///   to [`Value::Null`].
///
/// Max-rows, offset and equality constraints are honored while streaming;
/// order-by is not (a file cannot be read sorted), so an order-by filter stays
/// in the runtime chain for this source.
#[derive(Debug, Clone)]
pub struct CsvSource {
    table_name: String,
    path: PathBuf,
    schema: Schema,
}

impl CsvSource {
    /// Create a source named `table_name` over the CSV file at `path`.
    pub fn new(table_name: impl Into<String>, path: impl AsRef<Path>, schema: Schema) -> Self {
        Self {
            table_name: table_name.into(),
            path: path.as_ref().to_path_buf(),
            schema,
        }
    }
}

impl RowSource for CsvSource {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            max_rows: true,
            offset: true,
            order_by: false,
            equals: true,
        }
    }

    fn open(&self, constraints: &QueryConstraints) -> Result<Box<dyn RowStream>, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let headers = reader.headers()?.clone();

        // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
        let mut col_idxs = Vec::with_capacity(self.schema.fields.len());
        for field in &self.schema.fields {
            match headers.iter().position(|h| h == field.name) {
                Some(idx) => col_idxs.push(idx),
                None => {
                    return Err(SourceError::SchemaMismatch {
                        message: format!(
                            "missing required column '{}'. headers={:?}",
                            field.name,
                            headers.iter().collect::<Vec<_>>()
                        ),
                    });
                }
            }
        }

        Ok(Box::new(CsvStream {
            reader,
            schema: self.schema.clone(),
            col_idxs,
            constraints: constraints.clone(),
            next_record: 0,
            skipped: 0,
            yielded: 0,
        }))
    }
}

struct CsvStream {
    reader: csv::Reader<std::fs::File>,
    schema: Schema,
    col_idxs: Vec<usize>,
    constraints: QueryConstraints,
    next_record: usize,
    skipped: usize,
    yielded: usize,
}

impl RowStream for CsvStream {
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, SourceError> {
        if let Some(max) = self.constraints.max_rows {
            if self.yielded >= max {
                return Ok(None);
            }
        }

        let mut record = csv::StringRecord::new();
        loop {
            if !self.reader.read_record(&mut record)? {
                return Ok(None);
            }
            self.next_record += 1;
            // Report 1-based row number for users; +1 again because header is row 1.
            let user_row = self.next_record + 1;

            let mut row: Vec<Value> = Vec::with_capacity(self.schema.fields.len());
            for (field, &csv_idx) in self.schema.fields.iter().zip(self.col_idxs.iter()) {
                let raw = record.get(csv_idx).unwrap_or("");
                row.push(parse_typed_value(user_row, &field.name, &field.data_type, raw)?);
            }

            if !matches_equals(&self.schema, &row, &self.constraints.equals) {
                continue;
            }
            if self.skipped < self.constraints.offset {
                self.skipped += 1;
                continue;
            }

            self.yielded += 1;
            return Ok(Some(row));
        }
    }
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    raw: &str,
) -> Result<Value, SourceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| SourceError::Parse {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }),
        DataType::Float64 => trimmed
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| SourceError::Parse {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }),
        DataType::Bool => parse_bool(trimmed)
            .map(Value::Bool)
            .map_err(|message| SourceError::Parse {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message,
            }),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}
