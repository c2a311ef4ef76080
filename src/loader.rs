//! Loading model descriptions and configuration documents.
//!
//! A model description is a JSON object mapping type names to their
//! declaration:
//!
//! ```json
//! {
//!   "Person": {
//!     "fields": {
//!       "firstName": { "type": "String", "required": true },
//!       "friends": [{ "type": "ObjectId", "ref": "Person" }],
//!       "address": { "street": "String", "city": "String" }
//!     },
//!     "virtuals": ["fullName"],
//!     "options": { "id": true, "versionKey": "__v", "exposeVirtuals": false }
//!   }
//! }
//! ```
//!
//! A field is declared by a type name (`"String"`, `"Date"`, or the name of
//! another declared type to embed it), a one-element array (`["String"]`),
//! an object with a `type` key and options, or a plain object of nested
//! fields.

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::config::Config;
use crate::error::{LoadError, SchemaError};
use crate::registry::Registry;
use crate::types::{
    json_type_name, DocumentType, FieldDescriptor, FieldKind, MapValues, ScalarType, TypeOptions,
};

/// Load a model description file into a new registry.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// `LoadError::InvalidJson` if it isn't valid JSON, or `LoadError::Schema`
/// if the description is malformed.
pub fn load_models(path: &Path) -> Result<Registry, LoadError> {
    let value = read_json(path)?;
    Ok(registry_from(&value)?)
}

/// Load a model description from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON, or
/// `LoadError::Schema` if the description is malformed.
pub fn load_models_str(content: &str) -> Result<Registry, LoadError> {
    let value: Value =
        serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    Ok(registry_from(&value)?)
}

/// Load a configuration document.
///
/// # Errors
///
/// Returns IO and JSON errors like [`load_models`], or `LoadError::Config`
/// for invalid options.
pub fn load_config(path: &Path) -> Result<Config, LoadError> {
    let value = read_json(path)?;
    Ok(Config::from_value(&value)?)
}

fn read_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

fn registry_from(value: &Value) -> Result<Registry, SchemaError> {
    let mut registry = Registry::new();
    for ty in parse_models(value)? {
        registry.register(ty)?;
    }
    Ok(registry)
}

/// Parse every document type of a model description, in declaration order.
///
/// # Errors
///
/// Returns `SchemaError::InvalidModel` for malformed declarations and
/// `SchemaError::UnmappableField` / `SchemaError::InvalidFieldOption` for
/// fields that cannot be described.
pub fn parse_models(value: &Value) -> Result<Vec<DocumentType>, SchemaError> {
    let models = value.as_object().ok_or_else(|| SchemaError::InvalidModel {
        message: format!(
            "expected an object of document types, got {}",
            json_type_name(value)
        ),
    })?;
    let names: HashSet<&str> = models.keys().map(String::as_str).collect();

    models
        .iter()
        .map(|(name, declaration)| parse_type(name, declaration, &names))
        .collect()
}

fn parse_type(
    name: &str,
    declaration: &Value,
    types: &HashSet<&str>,
) -> Result<DocumentType, SchemaError> {
    let invalid = |message: String| SchemaError::InvalidModel {
        message: format!("type '{}': {}", name, message),
    };
    let declaration = declaration
        .as_object()
        .ok_or_else(|| invalid(format!("expected an object, got {}", json_type_name(declaration))))?;

    let mut ty = DocumentType::new(name);
    for (key, value) in declaration {
        match key.as_str() {
            "fields" => {
                let fields = value
                    .as_object()
                    .ok_or_else(|| invalid("'fields' must be an object".to_string()))?;
                for (path, field) in fields {
                    ty.add(path.as_str(), parse_field(path, field, types)?);
                }
            }
            "virtuals" => {
                let virtuals = value
                    .as_array()
                    .ok_or_else(|| invalid("'virtuals' must be an array".to_string()))?;
                for virtual_name in virtuals {
                    let virtual_name = virtual_name
                        .as_str()
                        .ok_or_else(|| invalid("virtual names must be strings".to_string()))?;
                    ty.add_virtual(virtual_name);
                }
            }
            "options" => ty.set_options(parse_options(value).map_err(invalid)?),
            other => return Err(invalid(format!("unknown key '{}'", other))),
        }
    }
    Ok(ty)
}

fn parse_options(value: &Value) -> Result<TypeOptions, String> {
    let map = value
        .as_object()
        .ok_or_else(|| "'options' must be an object".to_string())?;
    let mut options = TypeOptions::default();
    for (key, option) in map {
        match (key.as_str(), option) {
            ("id", Value::Bool(id)) => options.id = *id,
            ("versionKey", Value::String(version_key)) => {
                options.version_key = Some(version_key.clone())
            }
            ("versionKey", Value::Bool(false) | Value::Null) => options.version_key = None,
            ("exposeVirtuals", Value::Bool(expose)) => options.expose_virtuals = *expose,
            ("id" | "versionKey" | "exposeVirtuals", other) => {
                return Err(format!(
                    "invalid value for option '{}': {}",
                    key,
                    json_type_name(other)
                ))
            }
            (other, _) => return Err(format!("unknown option '{}'", other)),
        }
    }
    Ok(options)
}

/// Parse one field declaration.
///
/// # Errors
///
/// Returns `SchemaError::UnmappableField` for shapes that don't describe a
/// field, and `SchemaError::InvalidFieldOption` for mistyped options.
pub fn parse_field(
    field: &str,
    value: &Value,
    types: &HashSet<&str>,
) -> Result<FieldDescriptor, SchemaError> {
    match value {
        Value::String(type_name) => kind_from_name(field, type_name, types).map(FieldDescriptor::new),
        Value::Array(items) => match items.as_slice() {
            [] => Ok(FieldDescriptor::array_of(FieldDescriptor::mixed())),
            [item] => Ok(FieldDescriptor::array_of(parse_field(field, item, types)?)),
            _ => Err(unmappable(field, "array with several item declarations")),
        },
        Value::Object(map) if is_typed(map) => parse_typed(field, map, types),
        Value::Object(map) => {
            let children = map
                .iter()
                .map(|(child, declaration)| {
                    parse_field(child, declaration, types).map(|d| (child.clone(), d))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FieldDescriptor::object(children))
        }
        other => Err(unmappable(field, json_type_name(other))),
    }
}

/// An object declares a typed field unless its `type` key is itself a typed
/// declaration, i.e. a nested field named `type`.
fn is_typed(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::Object(inner)) => !inner.contains_key("type"),
        Some(_) => true,
        None => false,
    }
}

fn kind_from_name(field: &str, name: &str, types: &HashSet<&str>) -> Result<FieldKind, SchemaError> {
    if let Some(scalar) = ScalarType::parse(name) {
        return Ok(FieldKind::Scalar(scalar));
    }
    match name.to_ascii_lowercase().as_str() {
        "bool" => return Ok(FieldKind::Scalar(ScalarType::Boolean)),
        "date" => return Ok(FieldKind::Date),
        "objectid" => return Ok(FieldKind::Reference { target: None }),
        "mixed" | "object" => return Ok(FieldKind::Mixed(None)),
        "map" => return Ok(FieldKind::Map(MapValues::Any)),
        "array" => return Ok(FieldKind::Array(Box::new(FieldDescriptor::mixed()))),
        _ => {}
    }
    if types.contains(name) {
        return Ok(FieldKind::Embedded(name.to_string()));
    }
    Err(unmappable(field, name))
}

fn parse_typed(
    field: &str,
    map: &Map<String, Value>,
    types: &HashSet<&str>,
) -> Result<FieldDescriptor, SchemaError> {
    let mut descriptor = match map.get("type") {
        Some(Value::String(name)) => FieldDescriptor::new(kind_from_name(field, name, types)?),
        Some(declaration) => parse_field(field, declaration, types)?,
        None => FieldDescriptor::mixed(),
    };

    for (key, option) in map {
        let option = unwrap_message(key, option);
        let c = &mut descriptor.constraints;
        match key.as_str() {
            "type" => {}
            "required" => c.required = expect_bool(field, key, option)?,
            "min" => c.minimum = Some(expect_number(field, key, option)?),
            "max" => c.maximum = Some(expect_number(field, key, option)?),
            "minLength" | "minlength" => c.min_length = Some(expect_length(field, key, option)?),
            "maxLength" | "maxlength" => c.max_length = Some(expect_length(field, key, option)?),
            "match" => c.pattern = Some(expect_str(field, key, option)?.to_string()),
            "enum" => {
                c.enum_values = Some(
                    option
                        .as_array()
                        .cloned()
                        .ok_or_else(|| invalid_option(field, key, "array", option))?,
                )
            }
            "default" => c.default = Some(option.clone()),
            "description" => c.description = Some(expect_str(field, key, option)?.to_string()),
            "descr" => c.descr = Some(expect_str(field, key, option)?.to_string()),
            "title" => c.title = Some(expect_str(field, key, option)?.to_string()),
            "select" => c.hidden = !expect_bool(field, key, option)?,
            "excludeFromJSONSchema" => c.exclude_from_schema = expect_bool(field, key, option)?,
            "ref" => {
                let target = expect_str(field, key, option)?.to_string();
                match &mut descriptor.kind {
                    FieldKind::Reference { target: slot } => *slot = Some(target),
                    _ => return Err(invalid_option(field, key, "an ObjectId field", option)),
                }
            }
            "of" => {
                let values = parse_field(&format!("{}.of", field), option, types)?;
                match &mut descriptor.kind {
                    FieldKind::Map(slot) => *slot = MapValues::Of(Box::new(values)),
                    FieldKind::Array(item) => *item = Box::new(values),
                    _ => return Err(invalid_option(field, key, "a Map or Array field", option)),
                }
            }
            "additionalProperties" if matches!(descriptor.kind, FieldKind::Map(_)) => {
                if expect_bool(field, key, option)? {
                    descriptor.kind = FieldKind::Map(MapValues::Unconstrained);
                }
            }
            _ => {
                c.metadata.insert(key.clone(), option.clone());
            }
        }
    }
    Ok(descriptor)
}

/// Constraint options may be given as `[value, message]`.
fn unwrap_message<'v>(key: &str, option: &'v Value) -> &'v Value {
    const WITH_MESSAGE: &[&str] = &[
        "required",
        "min",
        "max",
        "minLength",
        "minlength",
        "maxLength",
        "maxlength",
        "match",
    ];
    match option {
        Value::Array(pair) if WITH_MESSAGE.contains(&key) && pair.len() == 2 && pair[1].is_string() => {
            &pair[0]
        }
        _ => option,
    }
}

fn expect_bool(field: &str, key: &str, option: &Value) -> Result<bool, SchemaError> {
    option
        .as_bool()
        .ok_or_else(|| invalid_option(field, key, "boolean", option))
}

fn expect_number(field: &str, key: &str, option: &Value) -> Result<Number, SchemaError> {
    match option {
        Value::Number(n) => Ok(n.clone()),
        _ => Err(invalid_option(field, key, "number", option)),
    }
}

fn expect_length(field: &str, key: &str, option: &Value) -> Result<u64, SchemaError> {
    option
        .as_u64()
        .ok_or_else(|| invalid_option(field, key, "non-negative integer", option))
}

fn expect_str<'v>(field: &str, key: &str, option: &'v Value) -> Result<&'v str, SchemaError> {
    option
        .as_str()
        .ok_or_else(|| invalid_option(field, key, "string", option))
}

fn invalid_option(field: &str, option: &str, expected: &'static str, actual: &Value) -> SchemaError {
    SchemaError::InvalidFieldOption {
        field: field.to_string(),
        option: option.to_string(),
        expected,
        actual: json_type_name(actual).to_string(),
    }
}

fn unmappable(field: &str, kind: &str) -> SchemaError {
    SchemaError::UnmappableField {
        field: field.to_string(),
        kind: kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn field(value: Value) -> Result<FieldDescriptor, SchemaError> {
        let types: HashSet<&str> = ["Person", "Comment"].into_iter().collect();
        parse_field("f", &value, &types)
    }

    #[test]
    fn load_models_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"Book": {{"fields": {{"title": "String"}}}}}}"#).unwrap();

        let registry = load_models(file.path()).unwrap();
        assert!(registry.get("Book").is_some());
    }

    #[test]
    fn load_models_file_not_found() {
        let result = load_models(Path::new("/nonexistent/models.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_models_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_models(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"forceRebuild": true}}"#).unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.force_rebuild);
    }

    #[test]
    fn load_config_rejects_unknown_option() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"nope": true}}"#).unwrap();

        let result = load_config(file.path());
        assert!(matches!(result, Err(LoadError::Config(_))));
    }

    #[test]
    fn shorthand_type_names() {
        assert_eq!(field(json!("String")).unwrap(), FieldDescriptor::string());
        assert_eq!(field(json!("number")).unwrap(), FieldDescriptor::number());
        assert_eq!(field(json!("Date")).unwrap(), FieldDescriptor::date());
        assert_eq!(field(json!("ObjectId")).unwrap(), FieldDescriptor::object_id());
        assert_eq!(field(json!("Mixed")).unwrap(), FieldDescriptor::mixed());
        assert_eq!(field(json!("Comment")).unwrap(), FieldDescriptor::embedded("Comment"));
        assert_eq!(
            field(json!(["String"])).unwrap(),
            FieldDescriptor::array_of(FieldDescriptor::string())
        );
        assert_eq!(
            field(json!([])).unwrap(),
            FieldDescriptor::array_of(FieldDescriptor::mixed())
        );
    }

    #[test]
    fn typed_declaration_with_options() {
        let d = field(json!({
            "type": "String",
            "required": [true, "title is required"],
            "minlength": 2,
            "maxLength": 40,
            "match": "/^[a-z]+$/i",
            "enum": ["a", "b"],
            "descr": "Short",
            "select": false,
            "x-order": 3
        }))
        .unwrap();
        let mut expected = FieldDescriptor::string()
            .required()
            .min_length(2)
            .max_length(40)
            .pattern("/^[a-z]+$/i")
            .one_of(["a", "b"])
            .hidden()
            .meta("x-order", 3);
        expected.constraints.descr = Some("Short".to_string());
        assert_eq!(d, expected);
    }

    #[test]
    fn references_and_maps() {
        assert_eq!(
            field(json!({"type": "ObjectId", "ref": "Person"})).unwrap(),
            FieldDescriptor::reference("Person")
        );
        assert_eq!(
            field(json!({"type": "Map", "of": "String"})).unwrap(),
            FieldDescriptor::map_of(FieldDescriptor::string())
        );
        assert_eq!(
            field(json!({"type": "Map", "additionalProperties": true})).unwrap().kind,
            FieldKind::Map(MapValues::Unconstrained)
        );
        assert_eq!(field(json!({"type": "Map"})).unwrap(), FieldDescriptor::map());
    }

    #[test]
    fn nested_objects() {
        let d = field(json!({"street": "String", "zip": {"type": "Number", "min": 0}})).unwrap();
        assert_eq!(
            d,
            FieldDescriptor::object([
                ("street", FieldDescriptor::string()),
                ("zip", FieldDescriptor::number().min(0)),
            ])
        );

        // a nested field literally named `type`
        let d = field(json!({"type": {"type": "String"}, "label": "String"})).unwrap();
        assert_eq!(
            d,
            FieldDescriptor::object([
                ("type", FieldDescriptor::string()),
                ("label", FieldDescriptor::string()),
            ])
        );
    }

    #[test]
    fn unmappable_shapes_fail_fast() {
        assert!(matches!(
            field(json!("Decimal128")),
            Err(SchemaError::UnmappableField { field, kind }) if field == "f" && kind == "Decimal128"
        ));
        assert!(matches!(
            field(json!(5)),
            Err(SchemaError::UnmappableField { kind, .. }) if kind == "number"
        ));
        assert!(matches!(
            field(json!(["String", "Number"])),
            Err(SchemaError::UnmappableField { .. })
        ));
    }

    #[test]
    fn mistyped_options_are_rejected() {
        assert!(matches!(
            field(json!({"type": "Number", "min": "zero"})),
            Err(SchemaError::InvalidFieldOption { option, expected: "number", .. }) if option == "min"
        ));
        assert!(matches!(
            field(json!({"type": "String", "ref": "Person"})),
            Err(SchemaError::InvalidFieldOption { .. })
        ));
    }

    #[test]
    fn parses_types_with_options_and_virtuals() {
        let types = parse_models(&json!({
            "Person": {
                "fields": {
                    "firstName": "String",
                    "address": {"street": "String", "city": "String"}
                },
                "virtuals": ["fullName"],
                "options": {"versionKey": "__v", "exposeVirtuals": true}
            },
            "Point": {
                "fields": {"x": "Number"},
                "options": {"id": false}
            }
        }))
        .unwrap();

        let person = &types[0];
        let paths: Vec<&str> = person.paths().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec!["firstName", "address.street", "address.city", "_id", "__v"]
        );
        assert_eq!(person.virtuals(), vec!["fullName", "id"]);
        assert!(person.options().expose_virtuals);
        assert!(!types[1].has_id());
    }

    #[test]
    fn malformed_models_are_rejected() {
        for bad in [
            json!([]),
            json!({"Book": 1}),
            json!({"Book": {"fields": []}}),
            json!({"Book": {"fields": {}, "extra": 1}}),
            json!({"Book": {"options": {"id": "yes"}}}),
            json!({"Book": {"options": {"strict": true}}}),
        ] {
            assert!(
                matches!(parse_models(&bad), Err(SchemaError::InvalidModel { .. })),
                "expected rejection of {}",
                bad
            );
        }
    }

    #[test]
    fn registry_from_string_keeps_declaration_order() {
        let registry =
            load_models_str(r#"{"A": {"fields": {"b": "B"}}, "B": {"fields": {"a": ["A"]}}}"#)
                .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(
            registry.get("B").unwrap().field("a"),
            Some(&FieldDescriptor::array_of(FieldDescriptor::embedded("A")))
        );
    }
}
