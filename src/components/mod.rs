//! Built-in components: filters, transformers and analyzers that ship with
//! the engine.

pub mod analyzers;
pub mod filters;
pub mod transformers;

pub use analyzers::{
    AverageAnalyzer, BooleanCrosstabAnalyzer, RowCountAnalyzer, ValueMatcherAnalyzer,
};
pub use filters::{EqualsFilter, MaxRowsFilter, NotNullFilter};
pub use transformers::{ConcatTransformer, UppercaseTransformer};

use crate::types::Value;

/// Render a value as a category/lookup key. Nulls render as `"<null>"`.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "<null>".to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Utf8(v) => v.clone(),
    }
}
