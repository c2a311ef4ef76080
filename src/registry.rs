//! Schema compilation for registered document types.
//!
//! The [`Registry`] is an arena of document types addressed by [`TypeId`].
//! Each type has a cache slot holding its canonical compiled schema. A small
//! mark-set records the types currently being compiled; meeting one of them
//! again means the type graph is cyclic, and the compiler emits a `$ref` to a
//! reference id synthesized once per type. A build carries that id at its
//! root only if it emitted a `$ref` to it, and a build still holding `$ref`s
//! to an enclosing type is not cached.
//!
//! Cached schemas are copy-on-read: every caller gets a deep copy it may
//! mutate freely.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::error::SchemaError;
use crate::path::{ensure, PathSlot};
use crate::population::{expand, PopulationSpec};
use crate::projection::{delete_path, strip_required};
use crate::redaction::{redact, RedactionRule};
use crate::selection::{excluded_paths, Selection};
use crate::translator::{EmbeddedSchemas, Translator};
use crate::types::{DocumentType, FieldDescriptor};

/// Reference ids are numbered per process, across all registries.
static SCHEMA_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn next_schema_id() -> String {
    format!("#schema-{}", SCHEMA_ID_COUNTER.fetch_add(1, Ordering::Relaxed) + 1)
}

/// Stable identifier of a registered document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

#[derive(Debug, Default)]
struct Slot {
    cached: Option<Value>,
    ref_id: Option<String>,
}

/// What to do with a compiled schema before handing it out.
#[derive(Debug, Clone, Default)]
pub struct DescribeRequest {
    /// Field selection. Supplying a non-empty one (even a deny-list) also
    /// strips every `required` constraint from the result.
    pub select: Option<Selection>,
    /// Reference fields to expand into the referenced type's schema.
    pub populate: Vec<PopulationSpec>,
    /// Rules removing fields regardless of selection.
    pub redact: Vec<RedactionRule>,
}

impl DescribeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.select = Some(selection);
        self
    }

    pub fn populate(mut self, specs: Vec<PopulationSpec>) -> Self {
        self.populate = specs;
        self
    }

    pub fn redact(mut self, rules: Vec<RedactionRule>) -> Self {
        self.redact = rules;
        self
    }
}

/// Registered document types, their compiled schemas and the configuration
/// they are compiled with.
#[derive(Debug, Default)]
pub struct Registry {
    types: Vec<Arc<DocumentType>>,
    index: HashMap<String, TypeId>,
    slots: Vec<Slot>,
    building: HashSet<TypeId>,
    /// Types a `$ref` was emitted to during the builds in progress.
    referenced: HashSet<TypeId>,
    config: Config,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// Cached schemas keep the configuration they were built with unless
    /// `force_rebuild` is set.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Register a document type under its name.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::DuplicateType` if the name is taken.
    pub fn register(&mut self, ty: DocumentType) -> Result<TypeId, SchemaError> {
        if self.index.contains_key(ty.name()) {
            return Err(SchemaError::DuplicateType {
                name: ty.name().to_string(),
            });
        }
        let id = TypeId(self.types.len());
        self.index.insert(ty.name().to_string(), id);
        self.types.push(Arc::new(ty));
        self.slots.push(Slot::default());
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Option<TypeId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&DocumentType> {
        self.id(name).map(|id| self.type_of(id))
    }

    pub fn type_of(&self, id: TypeId) -> &DocumentType {
        &self.types[id.0]
    }

    /// Registered type names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name())
    }

    /// Add a field to a registered type.
    ///
    /// Every cached schema is dropped: other types may embed copies of the
    /// changed one.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownType` if `name` isn't registered.
    pub fn extend_type(
        &mut self,
        name: &str,
        path: &str,
        descriptor: FieldDescriptor,
    ) -> Result<(), SchemaError> {
        let id = self.require(name)?;
        Arc::make_mut(&mut self.types[id.0]).add(path, descriptor);
        self.clear_cache();
        Ok(())
    }

    /// Drop every cached schema. Reference ids are kept.
    pub fn clear_cache(&mut self) {
        for slot in &mut self.slots {
            slot.cached = None;
        }
    }

    /// True if the named type has a cached compiled schema.
    pub fn is_cached(&self, name: &str) -> bool {
        self.id(name)
            .map(|id| self.slots[id.0].cached.is_some())
            .unwrap_or(false)
    }

    /// Compiled schema of a type, titled `title` (untitled when `None`).
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownType` for unregistered names, or the
    /// error raised while translating one of its fields.
    pub fn schema(&mut self, name: &str, title: Option<&str>) -> Result<Value, SchemaError> {
        let id = self.require(name)?;
        self.compile(id, title)
    }

    /// Describe a type: compile it, then expand, project and redact the copy.
    ///
    /// The result is titled with the type name.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownType` for unregistered names, or the
    /// error raised while compiling this or an expanded type.
    pub fn describe(&mut self, name: &str, request: &DescribeRequest) -> Result<Value, SchemaError> {
        let id = self.require(name)?;
        let mut schema = self.compile(id, Some(name))?;

        if !request.populate.is_empty() {
            expand(self, &mut schema, &request.populate)?;
        }

        let selection = request.select.clone().unwrap_or_default();
        for path in excluded_paths(self, id, &selection) {
            delete_path(&mut schema, &path);
        }

        if !request.redact.is_empty() {
            redact(&mut schema, &request.redact);
        }

        if request.select.as_ref().is_some_and(|s| !s.is_empty()) {
            strip_required(&mut schema);
        }

        Ok(schema)
    }

    fn require(&self, name: &str) -> Result<TypeId, SchemaError> {
        self.id(name).ok_or_else(|| SchemaError::UnknownType {
            name: name.to_string(),
        })
    }

    fn compile(&mut self, id: TypeId, title: Option<&str>) -> Result<Value, SchemaError> {
        if self.building.contains(&id) {
            let ref_id = self.slots[id.0]
                .ref_id
                .get_or_insert_with(next_schema_id)
                .clone();
            debug!("cycle through '{}', referencing {}", self.types[id.0].name(), ref_id);
            self.referenced.insert(id);
            return Ok(json!({ "$ref": ref_id }));
        }

        // Inside another build a cyclic type is rebuilt, so the cycle is cut
        // at the outermost type whatever the compile order.
        let nested = !self.building.is_empty();
        let cached = match &self.slots[id.0].cached {
            Some(schema) if !self.config.force_rebuild && !(nested && schema.get("id").is_some()) => {
                debug!("schema cache hit for '{}'", self.types[id.0].name());
                schema.clone()
            }
            _ => {
                debug!("building schema for '{}'", self.types[id.0].name());
                self.building.insert(id);
                let outer = std::mem::take(&mut self.referenced);
                let built = self.build(id);
                self.building.remove(&id);
                let mut inner = std::mem::replace(&mut self.referenced, outer);
                let mut schema = built?;

                if inner.remove(&id) {
                    if let Some(ref_id) = &self.slots[id.0].ref_id {
                        schema = with_leading(schema, "id", json!(ref_id));
                    }
                }
                if inner.is_empty() {
                    self.slots[id.0].cached = Some(schema.clone());
                } else {
                    debug!(
                        "not caching '{}': it refers to an enclosing type",
                        self.types[id.0].name()
                    );
                    self.referenced.extend(inner);
                }
                schema
            }
        };

        Ok(retitle(cached, title))
    }

    fn build(&mut self, id: TypeId) -> Result<Value, SchemaError> {
        let ty = Arc::clone(&self.types[id.0]);
        let config = self.config.clone();
        let mut result = json!({ "type": "object", "properties": {} });

        for (path, descriptor) in ty.paths() {
            if descriptor.constraints.exclude_from_schema {
                continue;
            }
            let PathSlot {
                container,
                property,
            } = ensure(&mut result, path).ok_or_else(|| path_conflict(path))?;
            let translated = Translator::new(&config, self).translate(&property, descriptor)?;

            let parent = result
                .pointer_mut(&container)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| path_conflict(path))?;
            if let Some(Value::Object(properties)) = parent.get_mut("properties") {
                properties.insert(property.clone(), translated.schema);
            }
            if translated.required {
                if let Value::Array(required) = parent
                    .entry("required")
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    required.push(Value::String(property));
                }
            }
        }

        if ty.options().expose_virtuals {
            if let Some(Value::Object(properties)) = result.get_mut("properties") {
                for name in ty.virtuals() {
                    properties.entry(name).or_insert_with(|| json!({}));
                }
            }
        }

        Ok(result)
    }
}

impl EmbeddedSchemas for Registry {
    fn embedded_schema(
        &mut self,
        type_name: &str,
        title: &str,
    ) -> Result<Option<Value>, SchemaError> {
        match self.id(type_name) {
            Some(id) => self.compile(id, Some(title).filter(|t| !t.is_empty())).map(Some),
            None => Ok(None),
        }
    }
}

fn path_conflict(path: &str) -> SchemaError {
    SchemaError::PathConflict {
        path: path.to_string(),
    }
}

/// Set or remove the root title, keeping `id` and `title` as leading keys.
fn retitle(schema: Value, title: Option<&str>) -> Value {
    let Value::Object(mut map) = schema else {
        return schema;
    };
    map.remove("title");
    let schema = Value::Object(map);
    match title {
        Some(title) if !title.is_empty() => {
            let with_title = with_leading(schema, "title", json!(title));
            let id = with_title.get("id").cloned();
            match id {
                Some(id) => with_leading(with_title, "id", id),
                None => with_title,
            }
        }
        _ => schema,
    }
}

/// Insert `key` as the first key of an object fragment.
fn with_leading(schema: Value, key: &str, value: Value) -> Value {
    let Value::Object(map) = schema else {
        return schema;
    };
    let mut result = Map::new();
    result.insert(key.to_string(), value);
    for (k, v) in map {
        if k != key {
            result.insert(k, v);
        }
    }
    Value::Object(result)
}
