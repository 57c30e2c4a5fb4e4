//! Record shapes selected by `@class`

use serde_json::{Map, Value};

use crate::schema::Schema;

/// A raw record viewed through the shape its class implies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Record<'a> {
    Ontology(&'a Map<String, Value>),
    Variant(&'a Map<String, Value>),
    Edge(&'a Map<String, Value>),
    /// Any other (or unknown) class
    Vertex(&'a Map<String, Value>),
}

impl<'a> Record<'a> {
    /// Classify a record by its own `@class`
    pub fn classify(schema: &Schema, record: &'a Map<String, Value>) -> Self {
        let class = record.get("@class").and_then(Value::as_str).unwrap_or("");
        Self::from_class(schema, class, record)
    }

    /// Classify a record as if it were of class `class`
    pub fn from_class(schema: &Schema, class: &str, record: &'a Map<String, Value>) -> Self {
        if schema.is_of_type(class, "Ontology") {
            Record::Ontology(record)
        } else if schema.is_of_type(class, "Variant") {
            Record::Variant(record)
        } else if schema.is_edge(class) {
            Record::Edge(record)
        } else {
            Record::Vertex(record)
        }
    }

    pub fn data(&self) -> &'a Map<String, Value> {
        match self {
            Record::Ontology(data)
            | Record::Variant(data)
            | Record::Edge(data)
            | Record::Vertex(data) => data,
        }
    }

    pub fn rid(&self) -> Option<&'a str> {
        self.data().get("@rid").and_then(Value::as_str)
    }

    /// Short human-readable description of the record
    pub fn preview(&self) -> String {
        let data = self.data();
        match self {
            Record::Ontology(_) => text(data, "name")
                .or_else(|| text(data, "sourceId"))
                .unwrap_or_default(),
            Record::Variant(_) => {
                let kind = data.get("type").map(linked_preview).unwrap_or_default();
                let mut preview = format!(
                    "{kind} variant on {}",
                    data.get("reference1").map(linked_preview).unwrap_or_default()
                );
                if let Some(reference2) = data.get("reference2").filter(|v| !v.is_null()) {
                    preview.push_str(" and ");
                    preview.push_str(&linked_preview(reference2));
                }
                preview
            }
            Record::Edge(_) => {
                let class = text(data, "@class").unwrap_or_else(|| "edge".to_string());
                let out = data.get("out").map(linked_preview).unwrap_or_default();
                let target = data.get("in").map(linked_preview).unwrap_or_default();
                format!("{out} {class} {target}")
            }
            Record::Vertex(_) => text(data, "displayName")
                .or_else(|| text(data, "name"))
                .or_else(|| text(data, "@rid"))
                .unwrap_or_default(),
        }
    }
}

fn text(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Preview of a linked value: the record's display text or the raw id
pub fn linked_preview(value: &Value) -> String {
    match value {
        Value::Object(map) => ["displayName", "name", "sourceId", "@rid"]
            .iter()
            .find_map(|key| text(map, key))
            .unwrap_or_default(),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
