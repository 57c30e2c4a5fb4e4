//! Property descriptors, type tags and casts

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::schema::ClassId;
use crate::schema::generators::Generator;

/// Type tag of a property
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    String,
    Integer,
    Long,
    Short,
    Double,
    Float,
    Decimal,
    Boolean,
    Link,
    LinkSet,
    LinkList,
    LinkBag,
    Embedded,
    EmbeddedSet,
    EmbeddedList,
    EmbeddedMap,
    Any,
}

impl PropertyType {
    /// Collection types whose elements are cast one by one
    pub fn is_iterable(&self) -> bool {
        matches!(
            self,
            PropertyType::LinkSet
                | PropertyType::LinkList
                | PropertyType::LinkBag
                | PropertyType::EmbeddedSet
                | PropertyType::EmbeddedList
                | PropertyType::EmbeddedMap
        )
    }

    /// Collection types that hold each element once
    pub fn is_set(&self) -> bool {
        matches!(self, PropertyType::LinkSet | PropertyType::EmbeddedSet)
    }

    pub fn is_link(&self) -> bool {
        matches!(
            self,
            PropertyType::Link | PropertyType::LinkSet | PropertyType::LinkList | PropertyType::LinkBag
        )
    }

    pub fn is_embedded(&self) -> bool {
        matches!(
            self,
            PropertyType::Embedded
                | PropertyType::EmbeddedSet
                | PropertyType::EmbeddedList
                | PropertyType::EmbeddedMap
        )
    }

    /// Single-valued primitive types (worth tracking for legends)
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            PropertyType::String
                | PropertyType::Integer
                | PropertyType::Long
                | PropertyType::Short
                | PropertyType::Double
                | PropertyType::Float
                | PropertyType::Decimal
                | PropertyType::Boolean
        )
    }

    /// Cast applied to a (single) value when none is configured
    pub fn default_cast(&self, has_linked_class: bool) -> Cast {
        match self {
            PropertyType::String => Cast::Trim,
            PropertyType::Integer | PropertyType::Long | PropertyType::Short => Cast::Integer,
            PropertyType::Double | PropertyType::Float | PropertyType::Decimal => Cast::Number,
            PropertyType::Boolean => Cast::Boolean,
            PropertyType::Link
            | PropertyType::LinkSet
            | PropertyType::LinkList
            | PropertyType::LinkBag => Cast::Rid,
            PropertyType::Embedded
            | PropertyType::EmbeddedSet
            | PropertyType::EmbeddedList
            | PropertyType::EmbeddedMap => {
                if has_linked_class {
                    Cast::Object
                } else {
                    Cast::Identity
                }
            }
            PropertyType::Any => Cast::Identity,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Long => "long",
            PropertyType::Short => "short",
            PropertyType::Double => "double",
            PropertyType::Float => "float",
            PropertyType::Decimal => "decimal",
            PropertyType::Boolean => "boolean",
            PropertyType::Link => "link",
            PropertyType::LinkSet => "linkset",
            PropertyType::LinkList => "linklist",
            PropertyType::LinkBag => "linkbag",
            PropertyType::Embedded => "embedded",
            PropertyType::EmbeddedSet => "embeddedset",
            PropertyType::EmbeddedList => "embeddedlist",
            PropertyType::EmbeddedMap => "embeddedmap",
            PropertyType::Any => "any",
        };
        f.write_str(name)
    }
}

/// Normalisation applied to a single value
///
/// Every cast is idempotent: applying it to its own output returns an equal
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cast {
    Identity,
    Trim,
    Lowercase,
    Uppercase,
    Integer,
    Number,
    Boolean,
    Rid,
    Object,
}

impl Cast {
    pub fn apply(&self, value: &Value) -> Result<Value, String> {
        match self {
            Cast::Identity => Ok(value.clone()),
            Cast::Trim => Ok(Value::String(text_of(value)?.trim().to_string())),
            Cast::Lowercase => Ok(Value::String(text_of(value)?.trim().to_lowercase())),
            Cast::Uppercase => Ok(Value::String(text_of(value)?.trim().to_uppercase())),
            Cast::Integer => cast_integer(value),
            Cast::Number => cast_number(value),
            Cast::Boolean => cast_boolean(value),
            Cast::Rid => cast_rid(value).map(Value::String),
            Cast::Object => match value {
                Value::Object(_) => Ok(value.clone()),
                other => Err(format!("expected an object but found {other}")),
            },
        }
    }
}

impl fmt::Display for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cast::Identity => "identity",
            Cast::Trim => "trim",
            Cast::Lowercase => "lowercase",
            Cast::Uppercase => "uppercase",
            Cast::Integer => "integer",
            Cast::Number => "number",
            Cast::Boolean => "boolean",
            Cast::Rid => "rid",
            Cast::Object => "object",
        };
        f.write_str(name)
    }
}

fn text_of(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected text but found {other}")),
    }
}

fn cast_integer(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
            _ => Err(format!("{n} is not an integer")),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("{s:?} is not an integer")),
        other => Err(format!("expected an integer but found {other}")),
    }
}

fn cast_number(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("{s:?} is not a number")),
        other => Err(format!("expected a number but found {other}")),
    }
}

fn cast_boolean(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("{s:?} is not a boolean")),
        },
        other => Err(format!("expected a boolean but found {other}")),
    }
}

/// Normalise a record id (`#12:3`, `12:3` or `{"@rid": "#12:3"}`) to `#12:3`
pub fn cast_rid(value: &Value) -> Result<String, String> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => match map.get("@rid") {
            Some(Value::String(s)) => s.as_str(),
            _ => return Err("linked record has no @rid".to_string()),
        },
        other => return Err(format!("expected a record id but found {other}")),
    };
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let (cluster, position) = body
        .split_once(':')
        .ok_or_else(|| format!("{raw:?} is not a record id"))?;
    match (cluster.parse::<i64>(), position.parse::<i64>()) {
        (Ok(cluster), Ok(position)) => Ok(format!("#{cluster}:{position}")),
        _ => Err(format!("{raw:?} is not a record id")),
    }
}

/// A resolved property of a class model
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub property_type: PropertyType,
    pub description: Option<String>,
    pub nullable: bool,
    pub mandatory: bool,
    pub non_empty: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub choices: Vec<Value>,
    pub linked_class: Option<ClassId>,
    pub default: Option<Value>,
    pub default_generator: Option<Generator>,
    pub generator: Option<Generator>,
    pub generated: bool,
    /// Cast applied to the value, or to each element of an iterable
    pub cast: Cast,
}

impl Property {
    /// Check `non_empty`, `min` and `max` against an already cast value
    pub(crate) fn check_bounds(&self, value: &Value) -> Result<(), BoundViolation> {
        if self.non_empty {
            let empty = match value {
                Value::String(s) => s.is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                _ => false,
            };
            if empty {
                return Err(BoundViolation::Empty);
            }
        }
        if let Some(number) = value.as_f64() {
            if self.min.is_some_and(|min| number < min) || self.max.is_some_and(|max| number > max)
            {
                return Err(BoundViolation::OutOfRange {
                    min: self.min,
                    max: self.max,
                });
            }
        }
        Ok(())
    }

    /// Whether a single (non-iterable) value is in the controlled vocabulary
    pub(crate) fn accepts_choice(&self, value: &Value) -> bool {
        if self.choices.is_empty() {
            return true;
        }
        if value.is_null() {
            return self.nullable;
        }
        self.choices.iter().any(|choice| choice == value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BoundViolation {
    Empty,
    OutOfRange { min: Option<f64>, max: Option<f64> },
}
