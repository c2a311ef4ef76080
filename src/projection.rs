//! Removing fields from compiled schema copies.

use log::trace;
use serde_json::{Map, Value};

use crate::path::resolve;
use crate::types::has_type;

/// Remove the field at `path` from `schema`.
///
/// The field's name is dropped from its parent's `required` list (the list
/// itself goes when it empties). A parent object left without properties is
/// removed in turn, up to but not including the root. Unknown paths are
/// ignored.
pub fn delete_path(schema: &mut Value, path: &str) {
    let Some(resolution) = resolve(schema, path) else {
        trace!("nothing to delete at '{}'", path);
        return;
    };

    let removed = schema
        .pointer_mut(&resolution.properties)
        .and_then(Value::as_object_mut)
        .and_then(|properties| properties.remove(&resolution.property));
    if removed.is_none() {
        trace!("nothing to delete at '{}'", path);
        return;
    }
    trace!("deleted '{}'", path);

    let Some(parent) = schema
        .pointer_mut(&resolution.parent)
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    remove_required(parent, &resolution.property);

    let emptied = parent
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(Map::is_empty);
    if emptied && !resolution.parent.is_empty() {
        if let Some((parent_path, _)) = path.rsplit_once('.') {
            delete_path(schema, parent_path);
        }
    }
}

/// Drop every `required` list from `fragment` and its descendants.
///
/// Array fragments are unwrapped to their items first.
pub fn strip_required(fragment: &mut Value) {
    if has_type(fragment, "array") {
        if let Some(items) = fragment.get_mut("items") {
            strip_required(items);
        }
        return;
    }

    let Some(map) = fragment.as_object_mut() else {
        return;
    };
    map.remove("required");
    if let Some(Value::Object(properties)) = map.get_mut("properties") {
        for property in properties.values_mut() {
            strip_required(property);
        }
    }
}

/// Remove `name` from the object's `required` list, dropping the list if it
/// becomes empty.
pub(crate) fn remove_required(object: &mut Map<String, Value>, name: &str) {
    let Some(Value::Array(required)) = object.get_mut("required") else {
        return;
    };
    required.retain(|r| r.as_str() != Some(name));
    if required.is_empty() {
        object.remove("required");
    }
}
