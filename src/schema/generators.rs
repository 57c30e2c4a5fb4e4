//! Named value generators for defaults and computed attributes
//!
//! Schema files refer to generators by name (`defaultGenerator: uuid`,
//! `generator: displayName`); a [`GeneratorRegistry`] maps those names to
//! functions when the schema is resolved.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::schema::Schema;
use crate::schema::record::Record;

/// What a generator may read while producing a value
pub struct GeneratorContext<'a> {
    pub schema: &'a Schema,
    /// Name of the class the record is being formatted as
    pub class: &'a str,
    pub record: &'a Map<String, Value>,
}

pub type GeneratorFn = Arc<dyn Fn(&GeneratorContext<'_>) -> Value + Send + Sync>;

/// A generator bound to its registered name
#[derive(Clone)]
pub struct Generator {
    name: String,
    func: GeneratorFn,
}

impl Generator {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generate(&self, context: &GeneratorContext<'_>) -> Value {
        (self.func)(context)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Generator").field(&self.name).finish()
    }
}

/// Registry of generators available to a schema
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, GeneratorFn>,
}

impl GeneratorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in generators registered
    ///
    /// Currently registers:
    /// - `uuid`: a random v4 UUID
    /// - `timestampNow`: milliseconds since the Unix epoch
    /// - `displayName`: the preview of the record being formatted
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("uuid", |_| Value::String(uuid::Uuid::new_v4().to_string()));
        registry.register("timestampNow", |_| {
            Value::from(chrono::Utc::now().timestamp_millis())
        });
        registry.register("displayName", |ctx| {
            Value::String(Record::from_class(ctx.schema, ctx.class, ctx.record).preview())
        });
        registry
    }

    /// Register a generator, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&GeneratorContext<'_>) -> Value + Send + Sync + 'static,
    {
        self.generators.insert(name.into(), Arc::new(func));
    }

    pub fn get(&self, name: &str) -> Option<Generator> {
        self.generators.get(name).map(|func| Generator {
            name: name.to_string(),
            func: Arc::clone(func),
        })
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.generators.keys().collect();
        names.sort();
        f.debug_struct("GeneratorRegistry")
            .field("generators", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::definition::SchemaDefinition;
    use serde_json::json;

    fn empty_schema() -> Schema {
        Schema::from_definition(&SchemaDefinition::new("empty")).unwrap()
    }

    #[test]
    fn defaults_register_builtin_generators() {
        let registry = GeneratorRegistry::with_defaults();
        assert!(registry.get("uuid").is_some());
        assert!(registry.get("timestampNow").is_some());
        assert!(registry.get("displayName").is_some());
        assert!(registry.get("sequence").is_none());
    }

    #[test]
    fn uuid_generator_produces_distinct_values() {
        let schema = empty_schema();
        let record = Map::new();
        let ctx = GeneratorContext {
            schema: &schema,
            class: "V",
            record: &record,
        };
        let uuid = GeneratorRegistry::with_defaults().get("uuid").unwrap();
        let first = uuid.generate(&ctx);
        let second = uuid.generate(&ctx);
        assert_ne!(first, second);
        assert_eq!(first.as_str().map(str::len), Some(36));
    }

    #[test]
    fn custom_generators_can_read_the_record() {
        let mut registry = GeneratorRegistry::new();
        registry.register("shout", |ctx| {
            let name = ctx.record.get("name").and_then(Value::as_str).unwrap_or("");
            Value::String(name.to_uppercase())
        });
        let schema = empty_schema();
        let record = json!({"name": "kras"});
        let ctx = GeneratorContext {
            schema: &schema,
            class: "Feature",
            record: record.as_object().unwrap(),
        };
        let shout = registry.get("shout").unwrap();
        assert_eq!(shout.name(), "shout");
        assert_eq!(shout.generate(&ctx), json!("KRAS"));
    }
}
