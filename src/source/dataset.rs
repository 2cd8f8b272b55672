//! In-memory row source backed by a [`DataSet`].

use std::sync::Arc;

use crate::error::SourceError;
use crate::source::{matches_equals, QueryConstraints, RowSource, RowStream, SourceCapabilities};
use crate::types::{DataSet, Schema, Value};

/// A [`RowSource`] over an in-memory [`DataSet`].
///
/// Honors every constraint kind, which makes it the reference source for
/// push-down equivalence testing.
#[derive(Debug, Clone)]
pub struct DataSetSource {
    table_name: String,
    dataset: Arc<DataSet>,
}

impl DataSetSource {
    /// Create a source named `table_name` over `dataset`.
    pub fn new(table_name: impl Into<String>, dataset: DataSet) -> Self {
        Self {
            table_name: table_name.into(),
            dataset: Arc::new(dataset),
        }
    }
}

impl RowSource for DataSetSource {
    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn schema(&self) -> &Schema {
        &self.dataset.schema
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::all()
    }

    fn open(&self, constraints: &QueryConstraints) -> Result<Box<dyn RowStream>, SourceError> {
        let schema = &self.dataset.schema;

        if let Some(order_column) = &constraints.order_by {
            if schema.index_of(order_column).is_none() {
                return Err(SourceError::SchemaMismatch {
                    message: format!(
                        "order-by column '{order_column}' not in table '{}'",
                        self.table_name
                    ),
                });
            }
        }

        let mut rows: Vec<Vec<Value>> = self
            .dataset
            .rows
            .iter()
            .filter(|row| matches_equals(schema, row, &constraints.equals))
            .cloned()
            .collect();

        if let Some(order_column) = &constraints.order_by {
            let idx = schema.index_of(order_column).unwrap_or(0);
            rows.sort_by(|a, b| a[idx].compare(&b[idx]));
        }

        let skipped = rows.len().min(constraints.offset);
        let mut rows: Vec<Vec<Value>> = rows.split_off(skipped);
        if let Some(max) = constraints.max_rows {
            rows.truncate(max);
        }

        Ok(Box::new(DataSetStream {
            rows: rows.into_iter(),
        }))
    }

    fn row_count_hint(&self) -> Option<usize> {
        Some(self.dataset.row_count())
    }
}

struct DataSetStream {
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl RowStream for DataSetStream {
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, SourceError> {
        Ok(self.rows.next())
    }
}

#[cfg(test)]
mod tests {
    use super::DataSetSource;
    use crate::source::{QueryConstraints, RowSource};
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn source() -> DataSetSource {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("name", DataType::Utf8),
        ]);
        let rows = vec![
            vec![Value::Int64(3), Value::Utf8("c".to_string())],
            vec![Value::Int64(1), Value::Utf8("a".to_string())],
            vec![Value::Int64(2), Value::Utf8("a".to_string())],
        ];
        DataSetSource::new("people", DataSet::new(schema, rows))
    }

    fn collect(source: &DataSetSource, constraints: &QueryConstraints) -> Vec<i64> {
        let mut stream = source.open(constraints).unwrap();
        let mut ids = Vec::new();
        while let Some(row) = stream.next_row().unwrap() {
            match row[0] {
                Value::Int64(v) => ids.push(v),
                _ => panic!("unexpected value"),
            }
        }
        ids
    }

    #[test]
    fn unconstrained_yields_source_order() {
        let src = source();
        assert_eq!(collect(&src, &QueryConstraints::none()), vec![3, 1, 2]);
        assert_eq!(src.row_count_hint(), Some(3));
    }

    #[test]
    fn order_offset_and_max_rows_compose() {
        let src = source();
        let constraints = QueryConstraints {
            order_by: Some("id".to_string()),
            offset: 1,
            max_rows: Some(1),
            ..QueryConstraints::none()
        };
        assert_eq!(collect(&src, &constraints), vec![2]);
    }

    #[test]
    fn equality_predicate_filters_rows() {
        let src = source();
        let constraints = QueryConstraints {
            equals: vec![("name".to_string(), Value::Utf8("a".to_string()))],
            ..QueryConstraints::none()
        };
        assert_eq!(collect(&src, &constraints), vec![1, 2]);
    }

    #[test]
    fn unknown_order_by_column_is_a_schema_mismatch() {
        let src = source();
        let constraints = QueryConstraints {
            order_by: Some("missing".to_string()),
            ..QueryConstraints::none()
        };
        let Err(err) = src.open(&constraints) else {
            panic!("expected opening with an unknown order-by column to fail");
        };
        assert!(err.to_string().contains("schema mismatch"));
    }
}
