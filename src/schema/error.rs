//! Errors raised while loading a schema or formatting records

use serde_json::Value;
use thiserror::Error;

use crate::schema::property::Cast;

/// Errors that can occur while reading or resolving a schema definition
#[derive(Error, Debug)]
pub enum SchemaError {
    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file format is not supported
    #[error("unsupported schema format: {0}")]
    UnsupportedFormat(String),

    /// The file extension could not be determined
    #[error("could not determine schema format from path: {0}")]
    UnknownExtension(String),

    /// A parsing error occurred
    #[error("parse error: {0}")]
    Parse(String),

    /// Two classes share a name (ignoring case)
    #[error("duplicate class name: {0}")]
    DuplicateClass(String),

    #[error("class {class} inherits from unknown class {parent}")]
    UnknownParent { class: String, parent: String },

    #[error("property {class}.{property} links to unknown class {linked}")]
    UnknownLinkedClass {
        class: String,
        property: String,
        linked: String,
    },

    #[error("property {class}.{property} uses unknown generator {generator}")]
    UnknownGenerator {
        class: String,
        property: String,
        generator: String,
    },

    #[error("inheritance cycle through class {0}")]
    InheritanceCycle(String),

    /// Lookup of a class that is not in the schema
    #[error("unknown class: {0}")]
    UnknownClass(String),
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// A record failed validation against a class model
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{class}.{attribute}: {kind}")]
pub struct AttributeError {
    pub class: String,
    pub attribute: String,
    /// The offending value, when there was one
    pub value: Option<Value>,
    pub kind: AttributeErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttributeErrorKind {
    #[error("unexpected attribute")]
    Unexpected,

    #[error("missing required attribute")]
    Missing,

    #[error("attribute cannot be null")]
    NotNullable,

    #[error("failed in casting ({cast}): {reason}")]
    Cast { cast: Cast, reason: String },

    #[error("violated the controlled vocabulary constraint (expected one of {choices})")]
    InvalidChoice { choices: String },

    #[error("value must not be empty")]
    Empty,

    #[error("value is outside of the allowed range {range}")]
    OutOfRange { range: String },

    #[error("{embedded} is not a subclass of {linked}")]
    InvalidEmbeddedClass { embedded: String, linked: String },

    #[error("expected a record object")]
    NotARecord,
}

impl AttributeError {
    pub fn new(
        class: impl Into<String>,
        attribute: impl Into<String>,
        value: Option<Value>,
        kind: AttributeErrorKind,
    ) -> Self {
        Self {
            class: class.into(),
            attribute: attribute.into(),
            value,
            kind,
        }
    }
}
