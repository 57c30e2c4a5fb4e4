//! Schema model
//!
//! A [`Schema`] is an arena of [`ClassModel`]s built once from a
//! [`SchemaDefinition`]. Parent and child relationships are stored as
//! [`ClassId`] lists and every inheritance-sensitive lookup is an explicit
//! traversal of those lists. Consumers receive the schema by reference.

pub mod definition;
pub mod error;
pub mod format;
pub mod generators;
pub mod property;
pub mod reader;
pub mod record;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Deref;
use std::path::Path;

use serde_json::Value;

pub use definition::{ClassDefinition, PropertyDefinition, SchemaDefinition};
pub use error::{AttributeError, AttributeErrorKind, SchemaError, SchemaResult};
pub use format::FormatOptions;
pub use generators::{GeneratorContext, GeneratorRegistry};
pub use property::{Cast, Property, PropertyType};
pub use record::Record;

/// Name of the class that receives one permission property per other class
pub const PERMISSIONS_CLASS: &str = "Permissions";

/// Permission bit flags stored in the generated `Permissions` properties
pub mod permissions {
    pub const NONE: i64 = 0b0000;
    pub const DELETE: i64 = 0b0001;
    pub const UPDATE: i64 = 0b0010;
    pub const READ: i64 = 0b0100;
    pub const CREATE: i64 = 0b1000;
    pub const ALL: i64 = CREATE | READ | UPDATE | DELETE;
}

/// Record attributes that are always accepted by `format_record`
pub const META_ATTRIBUTES: [&str; 3] = ["@rid", "@class", "@version"];

const BUNDLED_SCHEMA: &str = include_str!("../../schema/graphkb.yaml");

/// Index of a class model inside its schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

/// One record class
#[derive(Debug, Clone)]
pub struct ClassModel {
    pub name: String,
    pub description: Option<String>,
    /// Direct parents, in declaration order
    pub parents: Vec<ClassId>,
    /// Direct children
    pub children: Vec<ClassId>,
    pub is_abstract: bool,
    /// True when declared as an edge or inheriting from an edge class
    pub is_edge: bool,
    pub embedded: bool,
    pub identifiers: Vec<String>,
    /// Properties declared on this class only
    pub own_properties: BTreeMap<String, Property>,
}

/// The resolved schema
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub version: Option<String>,
    models: Vec<ClassModel>,
    index: HashMap<String, ClassId>,
}

impl Schema {
    /// Build a schema using the built-in generators
    pub fn from_definition(definition: &SchemaDefinition) -> SchemaResult<Self> {
        Self::from_definition_with(definition, &GeneratorRegistry::with_defaults())
    }

    /// Build a schema, resolving generator names against `generators`
    pub fn from_definition_with(
        definition: &SchemaDefinition,
        generators: &GeneratorRegistry,
    ) -> SchemaResult<Self> {
        let mut schema = Schema {
            name: definition.name.clone(),
            version: definition.version.clone(),
            models: Vec::with_capacity(definition.classes.len()),
            index: HashMap::new(),
        };

        // First pass: one model per definition so later passes can refer forward
        for (name, class) in &definition.classes {
            let key = name.to_lowercase();
            if schema.index.contains_key(&key) {
                return Err(SchemaError::DuplicateClass(name.clone()));
            }
            schema.index.insert(key, ClassId(schema.models.len()));
            schema.models.push(ClassModel {
                name: name.clone(),
                description: class.description.clone(),
                parents: Vec::new(),
                children: Vec::new(),
                is_abstract: class.is_abstract,
                is_edge: class.is_edge,
                embedded: class.embedded,
                identifiers: class.identifiers.clone(),
                own_properties: BTreeMap::new(),
            });
        }

        // Second pass: parent/child links
        for (name, class) in &definition.classes {
            let child = schema.lookup(name).ok_or_else(|| SchemaError::UnknownClass(name.clone()))?;
            for parent_name in &class.inherits {
                let parent = schema
                    .lookup(parent_name)
                    .ok_or_else(|| SchemaError::UnknownParent {
                        class: name.clone(),
                        parent: parent_name.clone(),
                    })?;
                schema.models[child.0].parents.push(parent);
                schema.models[parent.0].children.push(child);
            }
        }
        schema.check_acyclic()?;
        schema.propagate_edge_flag();

        // Third pass: properties, now that linked classes can be resolved
        for (name, class) in &definition.classes {
            let id = schema.lookup(name).ok_or_else(|| SchemaError::UnknownClass(name.clone()))?;
            for prop in &class.properties {
                let property = schema.resolve_property(name, prop, generators)?;
                schema.models[id.0]
                    .own_properties
                    .insert(property.name.clone(), property);
            }
        }

        schema.add_permission_properties();

        tracing::debug!(
            schema = %schema.name,
            classes = schema.models.len(),
            "resolved schema"
        );
        Ok(schema)
    }

    /// The knowledge-base schema shipped with the crate
    pub fn bundled() -> SchemaResult<Self> {
        let definition = reader::parse_yaml(BUNDLED_SCHEMA)?;
        Self::from_definition(&definition)
    }

    /// Read and resolve a schema file (`.yaml`, `.yml` or `.json`)
    pub fn from_path(path: &Path) -> SchemaResult<Self> {
        let definition = reader::read_definition(path)?;
        let schema = Self::from_definition(&definition)?;
        tracing::info!(path = %path.display(), classes = schema.len(), "loaded schema");
        Ok(schema)
    }

    fn lookup(&self, name: &str) -> Option<ClassId> {
        self.index.get(&name.to_lowercase()).copied()
    }

    fn model(&self, id: ClassId) -> &ClassModel {
        &self.models[id.0]
    }

    fn class_ref(&self, id: ClassId) -> ClassRef<'_> {
        ClassRef { schema: self, id }
    }

    fn check_acyclic(&self) -> SchemaResult<()> {
        // 0 = unvisited, 1 = on stack, 2 = done
        fn visit(schema: &Schema, id: ClassId, state: &mut [u8]) -> SchemaResult<()> {
            match state[id.0] {
                1 => return Err(SchemaError::InheritanceCycle(schema.model(id).name.clone())),
                2 => return Ok(()),
                _ => {}
            }
            state[id.0] = 1;
            for parent in &schema.model(id).parents {
                visit(schema, *parent, state)?;
            }
            state[id.0] = 2;
            Ok(())
        }

        let mut state = vec![0u8; self.models.len()];
        for index in 0..self.models.len() {
            visit(self, ClassId(index), &mut state)?;
        }
        Ok(())
    }

    fn propagate_edge_flag(&mut self) {
        let edges: Vec<bool> = (0..self.models.len())
            .map(|index| {
                let class = self.class_ref(ClassId(index));
                class.is_edge || class.ancestors().iter().any(|a| self.model(*a).is_edge)
            })
            .collect();
        for (model, is_edge) in self.models.iter_mut().zip(edges) {
            model.is_edge = is_edge;
        }
    }

    fn resolve_property(
        &self,
        class: &str,
        prop: &PropertyDefinition,
        generators: &GeneratorRegistry,
    ) -> SchemaResult<Property> {
        let linked_class = match &prop.linked_class {
            Some(linked) => Some(self.lookup(linked).ok_or_else(|| {
                SchemaError::UnknownLinkedClass {
                    class: class.to_string(),
                    property: prop.name.clone(),
                    linked: linked.clone(),
                }
            })?),
            None => None,
        };
        let find_generator = |name: &Option<String>| match name {
            Some(name) => generators
                .get(name)
                .map(Some)
                .ok_or_else(|| SchemaError::UnknownGenerator {
                    class: class.to_string(),
                    property: prop.name.clone(),
                    generator: name.clone(),
                }),
            None => Ok(None),
        };

        Ok(Property {
            name: prop.name.clone(),
            property_type: prop.property_type,
            description: prop.description.clone(),
            nullable: prop.nullable,
            mandatory: prop.mandatory,
            non_empty: prop.non_empty,
            min: prop.min,
            max: prop.max,
            choices: prop.choices.clone(),
            linked_class,
            default: prop.default.clone(),
            default_generator: find_generator(&prop.default_generator)?,
            generator: find_generator(&prop.generator)?,
            generated: prop.generated,
            cast: prop
                .cast
                .unwrap_or_else(|| prop.property_type.default_cast(linked_class.is_some())),
        })
    }

    fn add_permission_properties(&mut self) {
        let Some(permissions) = self.lookup(PERMISSIONS_CLASS) else {
            return;
        };
        let names: Vec<String> = self
            .models
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != permissions.0)
            .map(|(_, model)| model.name.clone())
            .collect();
        let own = &mut self.models[permissions.0].own_properties;
        for name in names {
            own.entry(name.clone()).or_insert_with(|| Property {
                name,
                property_type: PropertyType::Integer,
                description: None,
                nullable: false,
                mandatory: false,
                non_empty: false,
                min: Some(permissions::NONE as f64),
                max: Some(permissions::ALL as f64),
                choices: Vec::new(),
                linked_class: None,
                default: Some(Value::from(permissions::NONE)),
                default_generator: None,
                generator: None,
                generated: false,
                cast: Cast::Integer,
            });
        }
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Look up a class by name, ignoring case
    ///
    /// Only the named class is returned, never one of its subclasses.
    pub fn get(&self, name: &str) -> Option<ClassRef<'_>> {
        self.lookup(name).map(|id| self.class_ref(id))
    }

    /// Like [`Schema::get`] but failing with [`SchemaError::UnknownClass`]
    pub fn expect(&self, name: &str) -> SchemaResult<ClassRef<'_>> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownClass(name.to_string()))
    }

    /// The model named by a record's `@class`
    pub fn get_for_record(&self, record: &Value) -> Option<ClassRef<'_>> {
        record
            .get("@class")
            .and_then(Value::as_str)
            .and_then(|name| self.get(name))
    }

    /// All classes in name order
    pub fn classes(&self) -> impl Iterator<Item = ClassRef<'_>> {
        (0..self.models.len()).map(|index| self.class_ref(ClassId(index)))
    }

    /// True when `class` is `ancestor` or inherits from it, directly or not
    pub fn is_of_type(&self, class: &str, ancestor: &str) -> bool {
        let (Some(class), Some(ancestor)) = (self.lookup(class), self.lookup(ancestor)) else {
            return false;
        };
        class == ancestor || self.class_ref(class).ancestors().contains(&ancestor)
    }

    /// Every class that (transitively) inherits from `name`
    pub fn get_subclasses(&self, name: &str) -> Vec<ClassRef<'_>> {
        let Some(target) = self.lookup(name) else {
            return Vec::new();
        };
        self.classes()
            .filter(|class| class.ancestors().contains(&target))
            .collect()
    }

    pub fn is_edge(&self, name: &str) -> bool {
        self.get(name).is_some_and(|class| class.is_edge)
    }

    /// Names of the concrete edge classes
    pub fn edge_types(&self) -> Vec<&str> {
        self.models
            .iter()
            .filter(|model| model.is_edge && !model.is_abstract)
            .map(|model| model.name.as_str())
            .collect()
    }

    /// Record keys holding edge collections (`in_X` and `out_X`)
    pub fn expanded_edge_types(&self) -> Vec<String> {
        self.edge_types()
            .into_iter()
            .flat_map(|name| [format!("in_{name}"), format!("out_{name}")])
            .collect()
    }

    /// Edge entries present on a record, across every edge collection
    pub fn get_edges<'v>(&self, record: &'v Value) -> Vec<&'v Value> {
        self.expanded_edge_types()
            .iter()
            .filter_map(|key| record.get(key).and_then(Value::as_array))
            .flatten()
            .collect()
    }

    /// Property paths worth tracking for legends on nodes (or on edges)
    ///
    /// Includes `@class`, every scalar property, and `<link>.name` for single
    /// link properties.
    pub fn display_properties(&self, edges: bool) -> Vec<String> {
        let mut paths = BTreeSet::new();
        for class in self.classes() {
            if class.is_edge != edges || class.embedded {
                continue;
            }
            for (name, prop) in class.properties() {
                if prop.property_type.is_scalar() {
                    paths.insert(name.to_string());
                } else if prop.property_type == PropertyType::Link {
                    paths.insert(format!("{name}.name"));
                }
            }
        }
        std::iter::once("@class".to_string()).chain(paths).collect()
    }
}

/// A class model together with the schema it belongs to
#[derive(Clone, Copy)]
pub struct ClassRef<'a> {
    schema: &'a Schema,
    id: ClassId,
}

impl<'a> Deref for ClassRef<'a> {
    type Target = ClassModel;

    fn deref(&self) -> &ClassModel {
        self.schema.model(self.id)
    }
}

impl std::fmt::Debug for ClassRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ClassRef").field(&self.name).finish()
    }
}

impl PartialEq for ClassRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.id == other.id
    }
}

impl<'a> ClassRef<'a> {
    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn model(&self) -> &'a ClassModel {
        self.schema.model(self.id)
    }

    /// Direct parents
    pub fn parents(&self) -> Vec<ClassRef<'a>> {
        self.model()
            .parents
            .iter()
            .map(|id| self.schema.class_ref(*id))
            .collect()
    }

    /// Direct children
    pub fn subclasses(&self) -> Vec<ClassRef<'a>> {
        self.model()
            .children
            .iter()
            .map(|id| self.schema.class_ref(*id))
            .collect()
    }

    /// Transitive ancestors, nearest first
    fn ancestors(&self) -> Vec<ClassId> {
        let mut seen = Vec::new();
        for parent in &self.model().parents {
            if !seen.contains(parent) {
                seen.push(*parent);
            }
            for ancestor in self.schema.class_ref(*parent).ancestors() {
                if !seen.contains(&ancestor) {
                    seen.push(ancestor);
                }
            }
        }
        seen
    }

    /// Names of all ancestor classes, nearest first
    pub fn inherits(&self) -> Vec<&'a str> {
        self.ancestors()
            .into_iter()
            .map(|id| self.schema.model(id).name.as_str())
            .collect()
    }

    /// All classes below this one, breadth first
    pub fn descendants(&self) -> Vec<ClassRef<'a>> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<ClassId> = self.model().children.iter().copied().collect();
        let mut result = Vec::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            result.push(self.schema.class_ref(id));
            queue.extend(self.schema.model(id).children.iter().copied());
        }
        result
    }

    /// Effective properties: own properties over those of the parent chain
    ///
    /// With several parents the earlier parent wins over later ones.
    pub fn properties(&self) -> BTreeMap<&'a str, &'a Property> {
        let model = self.model();
        let mut properties: BTreeMap<&'a str, &'a Property> = model
            .own_properties
            .iter()
            .map(|(name, prop)| (name.as_str(), prop))
            .collect();
        for parent in self.parents() {
            for (name, prop) in parent.properties() {
                properties.entry(name).or_insert(prop);
            }
        }
        properties
    }

    pub fn property(&self, name: &str) -> Option<&'a Property> {
        self.properties().get(name).copied()
    }

    /// Names of mandatory properties
    pub fn required(&self) -> Vec<&'a str> {
        self.properties()
            .into_iter()
            .filter(|(_, prop)| prop.mandatory)
            .map(|(name, _)| name)
            .collect()
    }

    /// Names of properties that may be left out
    pub fn optional(&self) -> Vec<&'a str> {
        self.properties()
            .into_iter()
            .filter(|(_, prop)| !prop.mandatory)
            .map(|(name, _)| name)
            .collect()
    }

    /// Properties of this class and of every subclass, for searching across
    /// subtypes; the first class (breadth first) to declare a name wins
    pub fn query_properties(&self) -> BTreeMap<&'a str, &'a Property> {
        let mut result = BTreeMap::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([*self]);
        while let Some(class) = queue.pop_front() {
            if !seen.insert(class.id) {
                continue;
            }
            for (name, prop) in class.properties() {
                result.entry(name).or_insert(prop);
            }
            queue.extend(class.subclasses());
        }
        result
    }

    /// This class or one of its descendants, by name (ignoring case)
    pub fn subclass_model(&self, name: &str) -> Option<ClassRef<'a>> {
        if self.name.eq_ignore_ascii_case(name) {
            return Some(*self);
        }
        self.descendants()
            .into_iter()
            .find(|class| class.name.eq_ignore_ascii_case(name))
    }

    /// Class referenced by a link or embedded property
    pub fn linked_class(&self, prop: &Property) -> Option<ClassRef<'a>> {
        prop.linked_class.map(|id| self.schema.class_ref(id))
    }
}
