//! Declarative schema definitions
//!
//! These structs mirror the on-disk schema file (YAML or JSON). They carry
//! class and property names as plain strings; [`crate::schema::Schema`]
//! resolves them into linked models in a second pass so that definitions may
//! reference classes declared later in the file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::schema::property::{Cast, PropertyType};

/// Root container for a schema file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    /// A unique, machine-readable identifier for the schema
    pub name: String,
    /// Schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Schema description/documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Class definitions keyed by class name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub classes: BTreeMap<String, ClassDefinition>,
}

impl SchemaDefinition {
    /// Create a new schema with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            description: None,
            classes: BTreeMap::new(),
        }
    }

    /// Add a class definition, replacing any previous one with the same name
    pub fn with_class(mut self, name: impl Into<String>, class: ClassDefinition) -> Self {
        self.classes.insert(name.into(), class);
        self
    }
}

/// A record class definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Direct parent classes, earlier entries take precedence
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<String>,
    /// Whether this class is abstract (cannot be instantiated directly)
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    /// Whether records of this class are edges (carry `in`/`out`)
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_edge: bool,
    /// Whether records of this class only live nested inside other records
    #[serde(default, skip_serializing_if = "is_false")]
    pub embedded: bool,
    /// Property paths that identify a record of this class
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
    /// Properties declared directly on this class
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDefinition>,
}

impl ClassDefinition {
    /// Create a concrete class inheriting from the given parents
    pub fn inheriting<I, S>(parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inherits: parents.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Append a property definition
    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }
}

/// A single property (field) definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(default, rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether `null` is an acceptable value
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Whether the attribute must be present on a record
    #[serde(default, skip_serializing_if = "is_false")]
    pub mandatory: bool,
    /// Whether empty strings and empty collections are rejected
    #[serde(default, skip_serializing_if = "is_false")]
    pub non_empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Controlled vocabulary for the value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Value>,
    /// Class of the linked or embedded record(s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_class: Option<String>,
    /// Static default used when the attribute is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Named generator producing a default from the input record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_generator: Option<String>,
    /// Named generator computed last from the whole formatted record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    /// Always recompute the generator, even when a value was supplied
    #[serde(default, skip_serializing_if = "is_false")]
    pub generated: bool,
    /// Overrides the cast derived from the property type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<Cast>,
}

impl PropertyDefinition {
    /// Create a nullable, optional property of the given type
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            description: None,
            nullable: true,
            mandatory: false,
            non_empty: false,
            min: None,
            max: None,
            choices: Vec::new(),
            linked_class: None,
            default: None,
            default_generator: None,
            generator: None,
            generated: false,
            cast: None,
        }
    }

    /// Mark the property as mandatory and not nullable
    pub fn required(mut self) -> Self {
        self.mandatory = true;
        self.nullable = false;
        self
    }

    /// Set the linked class
    pub fn linked_to(mut self, class: impl Into<String>) -> Self {
        self.linked_class = Some(class.into());
        self
    }
}

fn default_true() -> bool {
    true
}

/// Helper function for serde skip_serializing_if
fn is_false(b: &bool) -> bool {
    !(*b)
}
