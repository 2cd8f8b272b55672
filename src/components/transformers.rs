//! Built-in transformers.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::component::{Component, ComponentDescriptor, ComponentInput, PropertyDescriptor, Transformer};
use crate::components::render_value;
use crate::error::ProcessingError;
use crate::types::{DataType, Field, Value};

/// Uppercases its single string input into one virtual column. Nulls pass
/// through as null.
pub struct UppercaseTransformer {
    descriptor: ComponentDescriptor,
}

impl UppercaseTransformer {
    pub fn new() -> Self {
        static DESCRIPTOR: OnceLock<ComponentDescriptor> = OnceLock::new();
        let descriptor = DESCRIPTOR.get_or_init(|| {
            ComponentDescriptor::new("uppercase")
                .with_output_columns(vec![Field::new("uppercase", DataType::Utf8)])
        });
        Self {
            descriptor: descriptor.clone(),
        }
    }
}

impl Default for UppercaseTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for UppercaseTransformer {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }
}

impl Transformer for UppercaseTransformer {
    fn transform(&self, input: &ComponentInput<'_>) -> Result<Vec<Value>, ProcessingError> {
        match input.value(0) {
            Value::Null => Ok(vec![Value::Null]),
            Value::Utf8(text) => Ok(vec![Value::Utf8(text.to_uppercase())]),
            other => Err(ProcessingError::new(format!(
                "expected a string input, got {other:?}"
            ))),
        }
    }
}

/// Joins all input values into one string virtual column, separated by a
/// configurable separator. Null inputs are skipped.
pub struct ConcatTransformer {
    descriptor: ComponentDescriptor,
    separator: String,
}

impl ConcatTransformer {
    pub fn new(separator: impl Into<String>) -> Self {
        static DESCRIPTOR: OnceLock<ComponentDescriptor> = OnceLock::new();
        let descriptor = DESCRIPTOR.get_or_init(|| {
            ComponentDescriptor::new("concat")
                .with_properties(vec![PropertyDescriptor::optional(
                    "separator",
                    DataType::Utf8,
                    Value::Utf8(String::new()),
                )])
                .with_output_columns(vec![Field::new("concat", DataType::Utf8)])
        });
        Self {
            descriptor: descriptor.clone(),
            separator: separator.into(),
        }
    }
}

impl Component for ConcatTransformer {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    fn configure(&mut self, properties: &BTreeMap<String, Value>) -> Result<(), ProcessingError> {
        if let Some(value) = properties.get("separator") {
            match value {
                Value::Utf8(separator) => self.separator = separator.clone(),
                other => {
                    return Err(ProcessingError::new(format!(
                        "property 'separator' must be a string, got {other:?}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Transformer for ConcatTransformer {
    fn transform(&self, input: &ComponentInput<'_>) -> Result<Vec<Value>, ProcessingError> {
        let parts: Vec<String> = (0..input.len())
            .map(|i| input.value(i))
            .filter(|value| !value.is_null())
            .map(render_value)
            .collect();
        Ok(vec![Value::Utf8(parts.join(&self.separator))])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{ConcatTransformer, UppercaseTransformer};
    use crate::component::{Component, ComponentInput, Transformer};
    use crate::types::{InputRow, Value};

    #[test]
    fn uppercase_handles_strings_and_nulls() {
        let transformer = UppercaseTransformer::new();
        let slots = [0usize];

        let row = InputRow::new(0, vec![Value::Utf8("hello".to_string())], 0);
        let output = transformer
            .transform(&ComponentInput::new(&row, &slots))
            .unwrap();
        assert_eq!(output, vec![Value::Utf8("HELLO".to_string())]);

        let row = InputRow::new(0, vec![Value::Null], 0);
        let output = transformer
            .transform(&ComponentInput::new(&row, &slots))
            .unwrap();
        assert_eq!(output, vec![Value::Null]);

        let row = InputRow::new(0, vec![Value::Int64(3)], 0);
        assert!(transformer
            .transform(&ComponentInput::new(&row, &slots))
            .is_err());
    }

    #[test]
    fn concat_joins_and_skips_nulls() {
        let transformer = ConcatTransformer::new(", ");
        let slots = [0usize, 1, 2];
        let row = InputRow::new(
            0,
            vec![
                Value::Utf8("a".to_string()),
                Value::Null,
                Value::Int64(7),
            ],
            0,
        );
        let output = transformer
            .transform(&ComponentInput::new(&row, &slots))
            .unwrap();
        assert_eq!(output, vec![Value::Utf8("a, 7".to_string())]);
    }

    #[test]
    fn concat_configures_its_separator() {
        let mut transformer = ConcatTransformer::new(", ");
        let properties = BTreeMap::from([(
            "separator".to_string(),
            Value::Utf8("|".to_string()),
        )]);
        transformer.configure(&properties).unwrap();

        let slots = [0usize, 1];
        let row = InputRow::new(
            0,
            vec![Value::Utf8("a".to_string()), Value::Utf8("b".to_string())],
            0,
        );
        let output = transformer
            .transform(&ComponentInput::new(&row, &slots))
            .unwrap();
        assert_eq!(output, vec![Value::Utf8("a|b".to_string())]);
    }

    #[test]
    fn concat_rejects_a_non_string_separator() {
        let mut transformer = ConcatTransformer::new("");
        let properties = BTreeMap::from([("separator".to_string(), Value::Int64(7))]);
        let err = transformer.configure(&properties).unwrap_err();
        assert!(err.message.contains("separator"));
    }
}
