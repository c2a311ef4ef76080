//! Expansion of reference fields into the referenced type's schema.

use log::debug;
use serde_json::Value;

use crate::error::SchemaError;
use crate::path::resolve;
use crate::registry::{DescribeRequest, Registry};
use crate::selection::Selection;
use crate::types::json_type_name;

/// One reference path to expand, with options for the expanded type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationSpec {
    pub path: String,
    /// Type to expand into when the fragment carries no `x-ref`.
    pub model: Option<String>,
    /// Selection applied to the expanded type.
    pub select: Option<Selection>,
    /// Expansions applied inside the expanded type.
    pub populate: Vec<PopulationSpec>,
}

impl PopulationSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.select = Some(selection);
        self
    }

    pub fn populate(mut self, specs: Vec<PopulationSpec>) -> Self {
        self.populate = specs;
        self
    }

    /// Parse the space-separated string form: one spec per path.
    pub fn parse(expr: &str) -> Vec<Self> {
        expr.split_whitespace().map(Self::new).collect()
    }

    /// Normalize any accepted JSON shape: a string, a single
    /// `{ "path", "select"?, "populate"?, "model"? }` object, or an array of
    /// strings and such objects.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidPopulation` for other shapes, and
    /// propagates selection errors from nested `select` options.
    pub fn from_value(value: &Value) -> Result<Vec<Self>, SchemaError> {
        match value {
            Value::String(expr) => Ok(Self::parse(expr)),
            Value::Object(_) => Ok(vec![Self::from_object(value)?]),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(path) => Ok(Self::new(path.as_str())),
                    Value::Object(_) => Self::from_object(item),
                    other => Err(SchemaError::InvalidPopulation {
                        message: format!("expected string or object entry, got {}", json_type_name(other)),
                    }),
                })
                .collect(),
            other => Err(SchemaError::InvalidPopulation {
                message: format!("expected string, object or array, got {}", json_type_name(other)),
            }),
        }
    }

    fn from_object(value: &Value) -> Result<Self, SchemaError> {
        let path = value
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::InvalidPopulation {
                message: "object entry needs a string 'path'".to_string(),
            })?;

        let mut spec = Self::new(path);
        match value.get("model") {
            None | Some(Value::Null) => {}
            Some(Value::String(model)) => spec.model = Some(model.clone()),
            Some(other) => {
                return Err(SchemaError::InvalidPopulation {
                    message: format!("'model' must be a string, got {}", json_type_name(other)),
                })
            }
        }
        if let Some(select) = value.get("select").filter(|v| !v.is_null()) {
            spec.select = Some(Selection::from_value(select)?);
        }
        if let Some(populate) = value.get("populate").filter(|v| !v.is_null()) {
            spec.populate = Self::from_value(populate)?;
        }
        Ok(spec)
    }
}

/// Replace each spec's reference fragment in `schema` with the described
/// schema of the referenced type.
///
/// The referenced type comes from the fragment's `x-ref`, or the spec's model
/// override. Specs whose path doesn't resolve, or whose type is unknown, are
/// skipped. Array fields get their innermost `items` replaced.
///
/// # Errors
///
/// Propagates compile errors of the referenced types.
pub fn expand(
    registry: &mut Registry,
    schema: &mut Value,
    specs: &[PopulationSpec],
) -> Result<(), SchemaError> {
    for spec in specs {
        let Some(target) = resolve(schema, &spec.path).and_then(|r| r.target) else {
            debug!("no field at '{}' to populate", spec.path);
            continue;
        };
        let Some(fragment) = schema.pointer(&target) else {
            continue;
        };

        let x_ref = fragment.get("x-ref").cloned();
        let description = fragment.get("description").cloned();
        let Some(model) = x_ref
            .as_ref()
            .and_then(Value::as_str)
            .or(spec.model.as_deref())
            .map(str::to_string)
        else {
            debug!("no referenced type for '{}'", spec.path);
            continue;
        };
        if registry.id(&model).is_none() {
            debug!("skipping population of '{}': unknown type '{}'", spec.path, model);
            continue;
        }

        let request = DescribeRequest {
            select: spec.select.clone(),
            populate: spec.populate.clone(),
            redact: Vec::new(),
        };
        let mut expanded = registry.describe(&model, &request)?;
        if let Value::Object(map) = &mut expanded {
            if let Some(x_ref) = x_ref {
                map.insert("x-ref".to_string(), x_ref);
            }
            if let Some(description) = description {
                map.insert("description".to_string(), description);
            }
        }

        debug!("populated '{}' with '{}'", spec.path, model);
        if let Some(slot) = schema.pointer_mut(&target) {
            *slot = expanded;
        }
    }
    Ok(())
}
