//! Compiler configuration.
//!
//! A [`Config`] is an immutable value held by a [`Registry`](crate::Registry).
//! It is consulted at translation time; each registry is its own
//! configuration and cache scope.

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::types::{json_type_name, FieldDescriptor};

/// Option name of the field options mapping.
pub const FIELD_OPTIONS_MAPPING: &str = "fieldOptionsMapping";

/// Option name of the force-rebuild flag.
pub const FORCE_REBUILD: &str = "forceRebuild";

/// Copies descriptor options onto emitted fragments under new keys.
///
/// Accepted shapes:
/// - `["description", ["ref", "x-ref-type"]]`: array of names or `[source, target]` pairs
/// - `{ "description": "x-notes" }`: object of `source: target`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptionsMapping {
    pairs: Vec<(String, String)>,
}

impl FieldOptionsMapping {
    /// Build a mapping from explicit `(source, target)` pairs.
    pub fn new<S: Into<String>, T: Into<String>>(pairs: impl IntoIterator<Item = (S, T)>) -> Self {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(s, t)| (s.into(), t.into()))
                .collect(),
        }
    }

    /// Parse and validate a mapping from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFieldOptionsMapping` for any other shape.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Array(entries) => {
                let pairs = entries
                    .iter()
                    .map(parse_mapping_entry)
                    .collect::<Option<Vec<_>>>()
                    .ok_or(ConfigError::InvalidFieldOptionsMapping)?;
                Ok(Self { pairs })
            }
            Value::Object(map) => {
                let pairs = map
                    .iter()
                    .map(|(source, target)| {
                        target.as_str().map(|t| (source.clone(), t.to_string()))
                    })
                    .collect::<Option<Vec<_>>>()
                    .ok_or(ConfigError::InvalidFieldOptionsMapping)?;
                Ok(Self { pairs })
            }
            _ => Err(ConfigError::InvalidFieldOptionsMapping),
        }
    }

    /// Collect the mapped options present on `descriptor`.
    ///
    /// Options the descriptor doesn't carry are skipped.
    pub fn apply(&self, descriptor: &FieldDescriptor) -> Map<String, Value> {
        let mut extra = Map::new();
        for (source, target) in &self.pairs {
            if let Some(value) = descriptor.option(source) {
                extra.insert(target.clone(), value);
            }
        }
        extra
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn parse_mapping_entry(entry: &Value) -> Option<(String, String)> {
    match entry {
        Value::String(name) => Some((name.clone(), name.clone())),
        Value::Array(pair) => match pair.as_slice() {
            [Value::String(source), Value::String(target)] => {
                Some((source.clone(), target.clone()))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Options consulted by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Vendor-extension passthrough applied to every translated field.
    pub field_options_mapping: Option<FieldOptionsMapping>,
    /// Bypass the per-type schema cache on every access.
    pub force_rebuild: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field options mapping.
    pub fn field_options_mapping(mut self, mapping: FieldOptionsMapping) -> Self {
        self.field_options_mapping = Some(mapping);
        self
    }

    /// Set the force-rebuild flag.
    pub fn force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    /// Parse a configuration document.
    ///
    /// Keys: `fieldOptionsMapping` (see [`FieldOptionsMapping::from_value`])
    /// and `forceRebuild` (boolean).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown keys or malformed values.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let Some(map) = value.as_object() else {
            return Err(ConfigError::InvalidOption {
                option: "config".to_string(),
                expected: "object",
                actual: json_type_name(value).to_string(),
            });
        };

        let mut config = Config::default();
        for (key, option) in map {
            match key.as_str() {
                FIELD_OPTIONS_MAPPING => {
                    config.field_options_mapping = match option {
                        Value::Null => None,
                        other => Some(FieldOptionsMapping::from_value(other)?),
                    };
                }
                FORCE_REBUILD => {
                    config.force_rebuild =
                        option.as_bool().ok_or_else(|| ConfigError::InvalidOption {
                            option: key.clone(),
                            expected: "boolean",
                            actual: json_type_name(option).to_string(),
                        })?;
                }
                other => {
                    return Err(ConfigError::UnknownOption {
                        option: other.to_string(),
                    })
                }
            }
        }
        Ok(config)
    }

    /// Extra fragment keys for `descriptor` under the current mapping.
    pub(crate) fn mapped_options(&self, descriptor: &FieldDescriptor) -> Map<String, Value> {
        self.field_options_mapping
            .as_ref()
            .map(|m| m.apply(descriptor))
            .unwrap_or_default()
    }
}
