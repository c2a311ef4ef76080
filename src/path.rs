//! Dotted-path addressing inside compiled schemas.
//!
//! Paths name fields the way documents do (`comment.editor`); arrays are
//! invisible, so a path transparently descends through `items`. Locations are
//! reported as JSON Pointers (RFC 6901) into the root fragment, usable with
//! [`Value::pointer`] and [`Value::pointer_mut`].

use serde_json::{json, Map, Value};

use crate::types::has_type;

/// Where a dotted path lands inside a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolution {
    /// Last path segment.
    pub property: String,
    /// Object fragment whose `properties` holds `property`.
    pub parent: String,
    /// The parent's `properties` map.
    pub properties: String,
    /// Fragment holding the target: the innermost array when the field is an
    /// array, otherwise the `properties` map.
    pub container: String,
    /// The field's fragment with array layers unwrapped; `None` if the field
    /// doesn't exist.
    pub target: Option<String>,
    /// True if the field itself is an array (possibly nested).
    pub is_array: bool,
}

/// A slot guaranteed to exist after [`ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSlot {
    /// Object fragment whose `properties` map receives `property`.
    pub container: String,
    pub property: String,
}

/// Resolve `path` against `root`.
///
/// Returns `None` when an intermediate segment is missing, so there is no
/// container to speak of. A missing leaf yields a resolution whose `target`
/// is `None`. Callers treat both as a no-op.
pub fn resolve(root: &Value, path: &str) -> Option<PathResolution> {
    let segments: Vec<&str> = path.split('.').collect();
    let (property, parents) = segments.split_last()?;

    let mut pointer = String::new();
    for segment in parents {
        pointer = unwrap_arrays(root, pointer);
        root.pointer(&pointer)?.get("properties")?.get(*segment)?;
        pointer = child_pointer(&pointer, segment);
    }

    let parent = unwrap_arrays(root, pointer);
    root.pointer(&parent)?.get("properties")?.as_object()?;
    let properties = format!("{}/properties", parent);

    let mut resolution = PathResolution {
        property: property.to_string(),
        parent,
        properties: properties.clone(),
        container: properties.clone(),
        target: None,
        is_array: false,
    };

    let mut target = format!("{}/{}", properties, escape_token(property));
    let Some(mut node) = root.pointer(&target) else {
        return Some(resolution);
    };
    while has_type(node, "array") {
        resolution.is_array = true;
        resolution.container = target.clone();
        target.push_str("/items");
        match root.pointer(&target) {
            Some(items) => node = items,
            None => return Some(resolution),
        }
    }
    resolution.target = Some(target);
    Some(resolution)
}

/// Walk `path` creating missing intermediate object fragments.
///
/// Intermediate fragments are created as `{ "title": segment, "type": "object" }`
/// and every container on the way gets a `properties` map. Returns `None` if
/// the walk runs into a fragment that isn't object-typed, such as a scalar
/// field or a `$ref`.
pub fn ensure(root: &mut Value, path: &str) -> Option<PathSlot> {
    let segments: Vec<&str> = path.split('.').collect();
    let (property, parents) = segments.split_last()?;

    let mut pointer = String::new();
    for segment in parents {
        pointer = unwrap_arrays(root, pointer);
        let properties = properties_mut(root.pointer_mut(&pointer)?)?;
        properties
            .entry(segment.to_string())
            .or_insert_with(|| json!({ "title": segment, "type": "object" }));
        pointer = child_pointer(&pointer, segment);
    }

    let container = unwrap_arrays(root, pointer);
    properties_mut(root.pointer_mut(&container)?)?;

    Some(PathSlot {
        container,
        property: property.to_string(),
    })
}

/// Pointer to `property` inside the `properties` of the fragment at `pointer`.
pub fn child_pointer(pointer: &str, property: &str) -> String {
    format!("{}/properties/{}", pointer, escape_token(property))
}

/// Escape a JSON Pointer reference token (`~` becomes `~0`, `/` becomes `~1`).
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Follow `items` from `pointer` while the fragment there is an array.
fn unwrap_arrays(root: &Value, mut pointer: String) -> String {
    while let Some(node) = root.pointer(&pointer) {
        if !has_type(node, "array") || node.get("items").is_none() {
            break;
        }
        pointer.push_str("/items");
    }
    pointer
}

fn properties_mut(node: &mut Value) -> Option<&mut Map<String, Value>> {
    if !has_type(node, "object") {
        return None;
    }
    node.as_object_mut()?
        .entry("properties")
        .or_insert_with(|| json!({}))
        .as_object_mut()
}
