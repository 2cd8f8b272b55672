//! Explicit component descriptors.
//!
//! A descriptor enumerates everything the job compiler needs to know about a
//! component type up front: configurable properties, the outcomes a filter can
//! produce, the columns a transformer emits, and whether a filter's outcome
//! can be folded into the source query. Descriptors are plain records built at
//! registration time; there is no runtime introspection.

use crate::component::outcome::Outcome;
use crate::types::{DataType, Field, Value};

/// One configurable property of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    /// Property name, as accepted by `configure`.
    pub name: String,
    /// Expected value type.
    pub data_type: DataType,
    /// Default value, if the property is optional.
    pub default: Option<Value>,
}

impl PropertyDescriptor {
    /// A required property.
    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            default: None,
        }
    }

    /// An optional property with a default.
    pub fn optional(name: impl Into<String>, data_type: DataType, default: Value) -> Self {
        Self {
            name: name.into(),
            data_type,
            default: Some(default),
        }
    }
}

/// Static description of a component type.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    /// Component type name, used in component identities and error messages.
    pub name: String,
    /// Configurable properties.
    pub properties: Vec<PropertyDescriptor>,
    /// The outcomes this component can assign to a row. Non-empty for filters
    /// only.
    pub outcomes: Vec<Outcome>,
    /// The virtual columns this component produces. Non-empty for
    /// transformers only.
    pub output_columns: Vec<Field>,
    /// Whether some outcome of this filter can be expressed as a source-query
    /// constraint (see [`crate::component::Filter::optimize_query`]).
    pub query_optimizable: bool,
}

impl ComponentDescriptor {
    /// Descriptor for a component with no outcomes, outputs or properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            outcomes: Vec::new(),
            output_columns: Vec::new(),
            query_optimizable: false,
        }
    }

    /// Add configurable properties.
    pub fn with_properties(mut self, properties: Vec<PropertyDescriptor>) -> Self {
        self.properties = properties;
        self
    }

    /// Declare the outcomes this filter can produce.
    pub fn with_outcomes(mut self, outcomes: Vec<Outcome>) -> Self {
        self.outcomes = outcomes;
        self
    }

    /// Declare the virtual columns this transformer produces.
    pub fn with_output_columns(mut self, output_columns: Vec<Field>) -> Self {
        self.output_columns = output_columns;
        self
    }

    /// Mark this filter as query-optimizable.
    pub fn query_optimizable(mut self) -> Self {
        self.query_optimizable = true;
        self
    }
}
