//! Record validation and normalisation against a class model

use serde_json::{Map, Value};

use crate::schema::error::{AttributeError, AttributeErrorKind};
use crate::schema::generators::{Generator, GeneratorContext};
use crate::schema::property::{BoundViolation, Property, PropertyType};
use crate::schema::{ClassRef, META_ATTRIBUTES};

/// Options controlling [`ClassRef::format_record`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// Silently drop attributes the class does not declare
    pub drop_extra: bool,
    /// Keep undeclared attributes instead of rejecting them
    pub ignore_extra: bool,
    /// Fill absent attributes from defaults and compute generated ones
    pub add_defaults: bool,
    /// Tolerate absent mandatory attributes
    pub ignore_missing: bool,
}

impl FormatOptions {
    pub fn with_defaults() -> Self {
        Self {
            add_defaults: true,
            ..Self::default()
        }
    }
}

impl<'a> ClassRef<'a> {
    /// Validate a record and return its normalised form
    ///
    /// Attributes are processed in name order. Embedded values are formatted
    /// recursively with the same options, using the value's `@class` when it
    /// names a subclass of the linked class.
    pub fn format_record(
        &self,
        record: &Map<String, Value>,
        options: &FormatOptions,
    ) -> Result<Map<String, Value>, AttributeError> {
        let properties = self.properties();

        if !options.ignore_extra && !options.drop_extra {
            for (attr, value) in record {
                if META_ATTRIBUTES.contains(&attr.as_str())
                    || (self.is_edge && (attr == "in" || attr == "out"))
                {
                    continue;
                }
                let root = attr.split('.').next().unwrap_or(attr);
                if !properties.contains_key(root) {
                    return Err(self.error(attr, Some(value.clone()), AttributeErrorKind::Unexpected));
                }
            }
        }

        let mut formatted = if options.drop_extra {
            Map::new()
        } else {
            record.clone()
        };
        for key in META_ATTRIBUTES {
            if let Some(value) = record.get(key) {
                formatted.insert(key.to_string(), value.clone());
            }
        }
        if self.is_edge {
            for key in ["out", "in"] {
                if let Some(value) = record.get(key) {
                    formatted.insert(key.to_string(), value.clone());
                }
            }
        }

        for (name, prop) in &properties {
            let supplied = record.get(*name);

            if options.add_defaults && supplied.is_none() && prop.generator.is_none() {
                let default = match (&prop.default, &prop.default_generator) {
                    (Some(value), _) => Some(value.clone()),
                    (None, Some(generator)) => Some(self.generate(generator, record)),
                    (None, None) => None,
                };
                if let Some(value) = default {
                    let value = self.cast_value(prop, &value)?;
                    formatted.insert(name.to_string(), value);
                }
            }

            if prop.mandatory
                && supplied.is_none()
                && !formatted.contains_key(*name)
                && !options.ignore_missing
                && !(options.add_defaults && prop.generator.is_some())
            {
                return Err(self.error(name, None, AttributeErrorKind::Missing));
            }

            if let Some(value) = supplied {
                let value = self.cast_value(prop, value)?;
                formatted.insert(name.to_string(), value);
            }

            if let Some(value) = formatted.get(*name) {
                self.check_choices(prop, value)?;
            }

            if prop.property_type.is_embedded() {
                if let Some(value) = formatted.get(*name).cloned() {
                    let value = self.format_embedded(prop, value, options)?;
                    formatted.insert(name.to_string(), value);
                }
            }
        }

        if options.add_defaults {
            for (name, prop) in &properties {
                let Some(generator) = &prop.generator else {
                    continue;
                };
                if prop.generated || record.get(*name).is_none() {
                    // a stale value must not feed its own regeneration
                    let mut context = formatted.clone();
                    context.remove(*name);
                    let value = self.generate(generator, &context);
                    let value = self.cast_value(prop, &value)?;
                    formatted.insert(name.to_string(), value);
                }
            }
        }

        Ok(formatted)
    }

    /// Like [`ClassRef::format_record`] for an arbitrary JSON value
    pub fn format_value(
        &self,
        value: &Value,
        options: &FormatOptions,
    ) -> Result<Map<String, Value>, AttributeError> {
        match value {
            Value::Object(record) => self.format_record(record, options),
            other => Err(self.error("@class", Some(other.clone()), AttributeErrorKind::NotARecord)),
        }
    }

    fn error(&self, attribute: &str, value: Option<Value>, kind: AttributeErrorKind) -> AttributeError {
        AttributeError::new(self.name.clone(), attribute, value, kind)
    }

    fn generate(&self, generator: &Generator, record: &Map<String, Value>) -> Value {
        generator.generate(&GeneratorContext {
            schema: self.schema(),
            class: &self.name,
            record,
        })
    }

    /// Cast a value (element-wise for iterables) and check its bounds
    fn cast_value(&self, prop: &Property, value: &Value) -> Result<Value, AttributeError> {
        if value.is_null() {
            return if prop.nullable {
                Ok(Value::Null)
            } else {
                Err(self.error(&prop.name, Some(Value::Null), AttributeErrorKind::NotNullable))
            };
        }

        let cast_one = |element: &Value| {
            prop.cast.apply(element).map_err(|reason| {
                self.error(
                    &prop.name,
                    Some(value.clone()),
                    AttributeErrorKind::Cast {
                        cast: prop.cast,
                        reason,
                    },
                )
            })
        };

        let cast = if prop.property_type == PropertyType::EmbeddedMap {
            match value {
                Value::Object(map) => {
                    let mut result = Map::new();
                    for (key, element) in map {
                        result.insert(key.clone(), cast_one(element)?);
                    }
                    Value::Object(result)
                }
                other => {
                    return Err(self.error(
                        &prop.name,
                        Some(other.clone()),
                        AttributeErrorKind::Cast {
                            cast: prop.cast,
                            reason: "expected a map".to_string(),
                        },
                    ));
                }
            }
        } else if prop.property_type.is_iterable() {
            let elements: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                single => vec![single],
            };
            let mut result: Vec<Value> = Vec::with_capacity(elements.len());
            for element in elements {
                let element = cast_one(element)?;
                if !prop.property_type.is_set() || !result.contains(&element) {
                    result.push(element);
                }
            }
            Value::Array(result)
        } else {
            cast_one(value)?
        };

        prop.check_bounds(&cast).map_err(|violation| {
            let kind = match violation {
                BoundViolation::Empty => AttributeErrorKind::Empty,
                BoundViolation::OutOfRange { min, max } => AttributeErrorKind::OutOfRange {
                    range: format!(
                        "[{}, {}]",
                        min.map_or("-inf".to_string(), |m| m.to_string()),
                        max.map_or("inf".to_string(), |m| m.to_string())
                    ),
                },
            };
            self.error(&prop.name, Some(cast.clone()), kind)
        })?;
        Ok(cast)
    }

    fn check_choices(&self, prop: &Property, value: &Value) -> Result<(), AttributeError> {
        let invalid = match value {
            Value::Array(items) if prop.property_type.is_iterable() => {
                items.iter().find(|item| !prop.accepts_choice(item))
            }
            single => (!prop.accepts_choice(single)).then_some(single),
        };
        match invalid {
            None => Ok(()),
            Some(bad) => {
                let choices = prop
                    .choices
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(self.error(
                    &prop.name,
                    Some(bad.clone()),
                    AttributeErrorKind::InvalidChoice { choices },
                ))
            }
        }
    }

    fn format_embedded(
        &self,
        prop: &Property,
        value: Value,
        options: &FormatOptions,
    ) -> Result<Value, AttributeError> {
        let Some(linked) = self.linked_class(prop) else {
            return Ok(value);
        };
        let format_one = |element: &Value| -> Result<Value, AttributeError> {
            let Value::Object(record) = element else {
                return Ok(element.clone());
            };
            let model = match record.get("@class").and_then(Value::as_str) {
                Some(class) => linked.subclass_model(class).ok_or_else(|| {
                    self.error(
                        &prop.name,
                        Some(element.clone()),
                        AttributeErrorKind::InvalidEmbeddedClass {
                            embedded: class.to_string(),
                            linked: linked.name.clone(),
                        },
                    )
                })?,
                None => linked,
            };
            model.format_record(record, options).map(Value::Object)
        };

        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) if prop.property_type.is_iterable() => items
                .iter()
                .map(format_one)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) if prop.property_type == PropertyType::EmbeddedMap => {
                let mut result = Map::new();
                for (key, element) in &map {
                    result.insert(key.clone(), format_one(element)?);
                }
                Ok(Value::Object(result))
            }
            single => format_one(&single),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, SchemaDefinition, reader};
    use serde_json::json;

    fn source_ontology_schema() -> Schema {
        let yaml = r#"
name: example
classes:
  Source:
    properties:
      - name: name
        mandatory: true
        nullable: false
  Ontology:
    inherits: [Source]
    properties:
      - name: sourceId
        mandatory: true
"#;
        Schema::from_definition(&reader::parse_yaml(yaml).unwrap()).unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn missing_inherited_mandatory_attribute_is_reported() {
        let schema = source_ontology_schema();
        let ontology = schema.get("Ontology").unwrap();
        let err = ontology
            .format_record(&object(json!({"sourceId": "DOID:1"})), &FormatOptions::default())
            .unwrap_err();
        assert_eq!(err.class, "Ontology");
        assert_eq!(err.attribute, "name");
        assert_eq!(err.kind, AttributeErrorKind::Missing);
    }

    #[test]
    fn ignore_missing_tolerates_absent_mandatory_attributes() {
        let schema = source_ontology_schema();
        let ontology = schema.get("Ontology").unwrap();
        let options = FormatOptions {
            ignore_missing: true,
            ..FormatOptions::default()
        };
        let formatted = ontology
            .format_record(&object(json!({"sourceId": " DOID:1 "})), &options)
            .unwrap();
        assert_eq!(formatted["sourceId"], json!("DOID:1"));
        assert!(!formatted.contains_key("name"));
    }

    #[test]
    fn unexpected_attributes_are_rejected_dropped_or_kept() {
        let schema = source_ontology_schema();
        let ontology = schema.get("Ontology").unwrap();
        let record = object(json!({"@rid": "#1:1", "name": "doid", "sourceId": "1", "colour": "red"}));

        let err = ontology
            .format_record(&record, &FormatOptions::default())
            .unwrap_err();
        assert_eq!(err.attribute, "colour");
        assert_eq!(err.kind, AttributeErrorKind::Unexpected);
        assert_eq!(err.value, Some(json!("red")));

        let dropped = ontology
            .format_record(
                &record,
                &FormatOptions {
                    drop_extra: true,
                    ..FormatOptions::default()
                },
            )
            .unwrap();
        assert!(!dropped.contains_key("colour"));
        assert_eq!(dropped["@rid"], json!("#1:1"));

        let kept = ontology
            .format_record(
                &record,
                &FormatOptions {
                    ignore_extra: true,
                    ..FormatOptions::default()
                },
            )
            .unwrap();
        assert_eq!(kept["colour"], json!("red"));
    }

    #[test]
    fn null_is_rejected_for_non_nullable_properties() {
        let schema = source_ontology_schema();
        let source = schema.get("Source").unwrap();
        let err = source
            .format_record(&object(json!({"name": null})), &FormatOptions::default())
            .unwrap_err();
        assert_eq!(err.kind, AttributeErrorKind::NotNullable);
    }

    #[test]
    fn bundled_disease_is_formatted_with_defaults() {
        let schema = Schema::bundled().unwrap();
        let disease = schema.get("Disease").unwrap();
        let record = object(json!({
            "@class": "Disease",
            "name": " Breast Cancer ",
            "sourceId": "DOID:1612",
            "source": {"@rid": "#12:1", "name": "disease ontology"},
            "subsets": ["A", "a", "B"]
        }));
        let formatted = disease
            .format_record(&record, &FormatOptions::with_defaults())
            .unwrap();

        assert_eq!(formatted["name"], json!("breast cancer"));
        assert_eq!(formatted["sourceId"], json!("doid:1612"));
        assert_eq!(formatted["source"], json!("#12:1"));
        assert_eq!(formatted["subsets"], json!(["a", "b"]));
        assert_eq!(formatted["deprecated"], json!(false));
        assert_eq!(formatted["displayName"], json!("breast cancer"));
        assert!(formatted["uuid"].is_string());
        assert!(formatted["createdAt"].is_i64());
    }

    #[test]
    fn formatting_with_defaults_is_idempotent() {
        let schema = Schema::bundled().unwrap();
        let options = FormatOptions::with_defaults();
        let records = [
            json!({"@class": "Disease", "name": "Cancer", "sourceId": "DOID:162", "source": "12:1"}),
            json!({
                "@class": "PositionalVariant",
                "type": "#5:1",
                "reference1": "#3:1",
                "break1Start": {"@class": "ProteinPosition", "pos": "12", "refAA": "g"},
                "untemplatedSeq": "D"
            }),
            json!({"@class": "AliasOf", "out": "#1:1", "in": "#1:2", "source": "#12:1"}),
        ];
        for record in records {
            let class = schema.get_for_record(&record).unwrap();
            let once = class.format_value(&record, &options).unwrap();
            let twice = class.format_record(&once, &options).unwrap();
            assert_eq!(once, twice, "formatting {} twice changed it", class.name);
        }
    }

    #[test]
    fn embedded_values_use_subclass_from_discriminator() {
        let schema = Schema::bundled().unwrap();
        let variant = schema.get("PositionalVariant").unwrap();
        let record = object(json!({
            "type": "#5:1",
            "reference1": "#3:1",
            "break1Start": {"@class": "CytobandPosition", "arm": "p", "majorBand": "11"}
        }));
        let options = FormatOptions {
            ignore_missing: true,
            ..FormatOptions::default()
        };
        let formatted = variant.format_record(&record, &options).unwrap();
        assert_eq!(formatted["break1Start"]["majorBand"], json!(11));

        let bad_arm = object(json!({
            "type": "#5:1",
            "reference1": "#3:1",
            "break1Start": {"@class": "CytobandPosition", "arm": "x"}
        }));
        let err = variant.format_record(&bad_arm, &options).unwrap_err();
        assert_eq!(err.class, "CytobandPosition");
        assert_eq!(err.attribute, "arm");
        assert!(matches!(err.kind, AttributeErrorKind::InvalidChoice { .. }));

        let not_a_position = object(json!({
            "type": "#5:1",
            "reference1": "#3:1",
            "break1Start": {"@class": "Disease", "name": "x"}
        }));
        let err = variant.format_record(&not_a_position, &options).unwrap_err();
        assert_eq!(err.attribute, "break1Start");
        assert!(matches!(err.kind, AttributeErrorKind::InvalidEmbeddedClass { .. }));
    }

    #[test]
    fn choices_allow_null_only_when_nullable() {
        let schema = Schema::bundled().unwrap();
        let statement = schema.get("Statement").unwrap();
        let options = FormatOptions {
            ignore_missing: true,
            ..FormatOptions::default()
        };
        let ok = statement
            .format_record(&object(json!({"reviewStatus": "passed"})), &options)
            .unwrap();
        assert_eq!(ok["reviewStatus"], json!("passed"));

        let err = statement
            .format_record(&object(json!({"reviewStatus": "maybe"})), &options)
            .unwrap_err();
        assert!(matches!(err.kind, AttributeErrorKind::InvalidChoice { .. }));

        let variant = schema.get("CategoryVariant").unwrap();
        let nullable = variant
            .format_record(&object(json!({"zygosity": null})), &options)
            .unwrap();
        assert_eq!(nullable["zygosity"], Value::Null);
    }

    #[test]
    fn cast_failures_carry_the_offending_value() {
        let schema = Schema::bundled().unwrap();
        let publication = schema.get("Publication").unwrap();
        let options = FormatOptions {
            ignore_missing: true,
            ..FormatOptions::default()
        };
        let err = publication
            .format_record(&object(json!({"year": "soon"})), &options)
            .unwrap_err();
        assert_eq!(err.attribute, "year");
        assert_eq!(err.value, Some(json!("soon")));
        assert!(matches!(err.kind, AttributeErrorKind::Cast { .. }));

        let err = publication
            .format_record(&object(json!({"year": 1200})), &options)
            .unwrap_err();
        assert!(matches!(err.kind, AttributeErrorKind::OutOfRange { .. }));
    }

    #[test]
    fn non_empty_linksets_are_enforced() {
        let schema = Schema::bundled().unwrap();
        let statement = schema.get("Statement").unwrap();
        let options = FormatOptions {
            ignore_missing: true,
            ..FormatOptions::default()
        };
        let err = statement
            .format_record(&object(json!({"conditions": []})), &options)
            .unwrap_err();
        assert_eq!(err.kind, AttributeErrorKind::Empty);

        let single = statement
            .format_record(&object(json!({"conditions": "#3:1"})), &options)
            .unwrap();
        assert_eq!(single["conditions"], json!(["#3:1"]));
    }

    #[test]
    fn edges_accept_in_and_out() {
        let schema = Schema::bundled().unwrap();
        let alias = schema.get("AliasOf").unwrap();
        let options = FormatOptions {
            ignore_missing: true,
            ..FormatOptions::default()
        };
        let formatted = alias
            .format_record(&object(json!({"out": "#1:1", "in": "#1:2"})), &options)
            .unwrap();
        assert_eq!(formatted["out"], json!("#1:1"));

        let disease = schema.get("Disease").unwrap();
        let err = disease
            .format_record(&object(json!({"out": "#1:1"})), &options)
            .unwrap_err();
        assert_eq!(err.kind, AttributeErrorKind::Unexpected);
    }

    #[test]
    fn generated_attributes_are_computed_from_the_formatted_record() {
        let schema = Schema::bundled().unwrap();
        let variant = schema.get("CategoryVariant").unwrap();
        let record = object(json!({
            "type": {"@rid": "#5:1", "name": "mutation"},
            "reference1": "#3:1",
            "displayName": "stale"
        }));
        let formatted = variant
            .format_record(&record, &FormatOptions::with_defaults())
            .unwrap();
        // links are cast to ids before the display name is generated
        assert_eq!(formatted["displayName"], json!("#5:1 variant on #3:1"));
    }

    #[test]
    fn generated_display_name_ignores_the_supplied_value() {
        let schema = Schema::bundled().unwrap();
        let source = schema.get("Source").unwrap();
        let record = object(json!({"name": "New Name", "displayName": "old name"}));
        let formatted = source
            .format_record(&record, &FormatOptions::with_defaults())
            .unwrap();
        assert_eq!(formatted["displayName"], json!("new name"));

        let mut edited = formatted.clone();
        edited.insert("name".to_string(), json!("renamed"));
        let reformatted = source
            .format_record(&edited, &FormatOptions::with_defaults())
            .unwrap();
        assert_eq!(reformatted["displayName"], json!("renamed"));
        assert_eq!(reformatted["uuid"], formatted["uuid"]);
    }

    #[test]
    fn embedded_maps_are_formatted_per_entry() {
        let yaml = r#"
name: slots
classes:
  Slot:
    embedded: true
    properties:
      - name: pos
        type: integer
        min: 1
  Layout:
    properties:
      - name: slots
        type: embeddedmap
        linkedClass: Slot
"#;
        let schema = Schema::from_definition(&reader::parse_yaml(yaml).unwrap()).unwrap();
        let layout = schema.get("Layout").unwrap();
        let options = FormatOptions::default();

        let formatted = layout
            .format_record(
                &object(json!({"slots": {"a": {"pos": "3"}, "b": {"pos": 4}}})),
                &options,
            )
            .unwrap();
        assert_eq!(formatted["slots"], json!({"a": {"pos": 3}, "b": {"pos": 4}}));

        let again = layout.format_record(&formatted, &options).unwrap();
        assert_eq!(again, formatted);

        let err = layout
            .format_record(&object(json!({"slots": {"a": {"pos": 0}}})), &options)
            .unwrap_err();
        assert_eq!(err.class, "Slot");
        assert!(matches!(err.kind, AttributeErrorKind::OutOfRange { .. }));

        let err = layout
            .format_record(&object(json!({"slots": ["a"]})), &options)
            .unwrap_err();
        assert_eq!(err.attribute, "slots");
        assert!(matches!(
            err.kind,
            AttributeErrorKind::Cast { ref reason, .. } if reason == "expected a map"
        ));
    }

    #[test]
    fn format_value_rejects_non_objects() {
        let schema = Schema::from_definition(
            &SchemaDefinition::new("tiny").with_class("V", Default::default()),
        )
        .unwrap();
        let err = schema
            .get("V")
            .unwrap()
            .format_value(&json!("text"), &FormatOptions::default())
            .unwrap_err();
        assert_eq!(err.kind, AttributeErrorKind::NotARecord);
    }
}
