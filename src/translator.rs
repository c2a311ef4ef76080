//! Type translation - maps one field descriptor to one schema fragment.
//!
//! The translator never stores build-time markers on the fragments it emits.
//! Whether a field is required by its parent is returned alongside the
//! fragment in [`Translated`].

use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::error::SchemaError;
use crate::types::{FieldDescriptor, FieldKind, MapValues, ID_PATTERN};

/// Prefix of the titles given to array items and map values.
pub const ITEM_TITLE_PREFIX: &str = "itemOf_";

/// A translated field: the emitted fragment and whether its parent must list
/// it in `required`.
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub schema: Value,
    pub required: bool,
}

/// Supplies schemas for embedded sub-document types.
///
/// Implemented by the schema compiler, which handles caching and cycles.
pub trait EmbeddedSchemas {
    /// Returns the schema of `type_name` titled `title`, or `None` if the type
    /// is unknown.
    fn embedded_schema(&mut self, type_name: &str, title: &str)
        -> Result<Option<Value>, SchemaError>;
}

/// Translates descriptors under one configuration snapshot.
pub struct Translator<'a, E: EmbeddedSchemas + ?Sized> {
    config: &'a Config,
    embedded: &'a mut E,
}

impl<'a, E: EmbeddedSchemas + ?Sized> Translator<'a, E> {
    pub fn new(config: &'a Config, embedded: &'a mut E) -> Self {
        Self { config, embedded }
    }

    /// Translate the field `name` described by `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnmappableField` if the field embeds a type the
    /// compiler doesn't know.
    pub fn translate(
        &mut self,
        name: &str,
        descriptor: &FieldDescriptor,
    ) -> Result<Translated, SchemaError> {
        let mut schema = match &descriptor.kind {
            FieldKind::Scalar(scalar) => json!({ "type": scalar.type_name() }),
            FieldKind::Date => json!({ "type": "string", "format": "date-time" }),
            FieldKind::Reference { .. } => json!({ "type": "string", "pattern": ID_PATTERN }),
            FieldKind::Array(item) => self.array(name, item)?,
            FieldKind::Map(values) => self.map(name, values)?,
            FieldKind::Object(fields) => self.object(name, fields)?,
            FieldKind::Embedded(type_name) => self
                .embedded
                .embedded_schema(type_name, name)?
                .ok_or_else(|| SchemaError::UnmappableField {
                    field: name.to_string(),
                    kind: type_name.clone(),
                })?,
            FieldKind::Mixed(Some(shape)) => self.translate(name, shape)?.schema,
            FieldKind::Mixed(None) => json!({}),
        };

        apply_constraints(&mut schema, descriptor);

        if let Value::Object(map) = &mut schema {
            for (key, value) in self.config.mapped_options(descriptor) {
                map.insert(key, value);
            }
        }

        Ok(Translated {
            schema,
            required: descriptor.constraints.required,
        })
    }

    fn array(&mut self, name: &str, item: &FieldDescriptor) -> Result<Value, SchemaError> {
        let items = self.translate(&item_title(name), item)?;
        let mut result = Map::new();
        result.insert("type".to_string(), json!("array"));
        result.insert("items".to_string(), items.schema);
        if items.required {
            result.insert("minItems".to_string(), json!(1));
        }
        Ok(Value::Object(result))
    }

    fn map(&mut self, name: &str, values: &MapValues) -> Result<Value, SchemaError> {
        let additional = match values {
            MapValues::Any => json!({ "type": {} }),
            MapValues::Unconstrained => Value::Bool(true),
            MapValues::Of(descriptor) => self.translate(&item_title(name), descriptor)?.schema,
        };
        Ok(json!({ "type": "object", "additionalProperties": additional }))
    }

    fn object(
        &mut self,
        name: &str,
        fields: &[(String, FieldDescriptor)],
    ) -> Result<Value, SchemaError> {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (field, descriptor) in fields {
            if descriptor.constraints.exclude_from_schema {
                continue;
            }
            let translated = self.translate(field, descriptor)?;
            if translated.required {
                required.push(Value::String(field.clone()));
            }
            properties.insert(field.clone(), translated.schema);
        }

        let mut result = Map::new();
        if !name.is_empty() {
            result.insert("title".to_string(), json!(name));
        }
        result.insert("type".to_string(), json!("object"));
        result.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            result.insert("required".to_string(), Value::Array(required));
        }
        Ok(Value::Object(result))
    }
}

fn item_title(name: &str) -> String {
    if name.is_empty() {
        String::new()
    } else {
        format!("{}{}", ITEM_TITLE_PREFIX, name)
    }
}

/// Copy descriptor constraints onto a fragment.
fn apply_constraints(schema: &mut Value, descriptor: &FieldDescriptor) {
    let Value::Object(t) = schema else {
        return;
    };
    let c = &descriptor.constraints;
    let target = match &descriptor.kind {
        FieldKind::Reference { target } => target.as_deref(),
        _ => None,
    };

    if let Some(values) = &c.enum_values {
        t.insert("enum".to_string(), Value::Array(values.clone()));
    }
    if let Some(target) = target {
        t.insert("x-ref".to_string(), json!(target));
    }
    if let Some(min) = &c.minimum {
        t.insert("minimum".to_string(), Value::Number(min.clone()));
    }
    if let Some(max) = &c.maximum {
        t.insert("maximum".to_string(), Value::Number(max.clone()));
    }
    if let Some(len) = c.min_length {
        t.insert("minLength".to_string(), json!(len));
    }
    if let Some(len) = c.max_length {
        t.insert("maxLength".to_string(), json!(len));
    }
    if let Some(rule) = &c.pattern {
        t.insert("pattern".to_string(), json!(regex_source(rule)));
    }
    if let Some(default) = &c.default {
        t.insert("default".to_string(), default.clone());
        if default.is_null() {
            if let Some(Value::String(ty)) = t.get("type").cloned() {
                t.insert("type".to_string(), json!([ty, "null"]));
            }
        }
    }

    let description = c
        .description
        .clone()
        .or_else(|| c.descr.clone())
        .or_else(|| target.map(|r| format!("Refers to {}", r)));
    if let Some(description) = description {
        t.insert("description".to_string(), json!(description));
    }

    if let Some(title) = &c.title {
        if !t.contains_key("title") {
            t.insert("title".to_string(), json!(title));
        }
    }
}

/// Source form of a match rule: `/^a+$/i` becomes `^a+$`; anything else is
/// returned unchanged.
pub fn regex_source(rule: &str) -> &str {
    if let Some(rest) = rule.strip_prefix('/') {
        if let Some(end) = rest.rfind('/') {
            return &rest[..end];
        }
    }
    rule
}
