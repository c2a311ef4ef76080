//! Field selection - which paths of a type survive projection.
//!
//! Selections come in three shapes:
//! - `"title -author +password"`: whitespace-separated paths
//! - `["title", "-author"]`: array of paths
//! - `{ "title": 1, "author": false }`: object of path to truthy/falsy
//!
//! In the string and array forms `-path` excludes a path and `+path` includes
//! it even if the type hides it by default. Any inclusion switches the
//! selection to allow-list mode; otherwise it is a deny-list.

use serde_json::Value;

use crate::error::SchemaError;
use crate::registry::{Registry, TypeId};
use crate::types::{json_type_name, FieldDescriptor, FieldKind, ID_ALIAS, ID_FIELD};

/// A normalized selection: path to include (`true`) or exclude (`false`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    entries: Vec<(String, bool)>,
    forced: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the whitespace-separated string form.
    pub fn parse(expr: &str) -> Self {
        Self::from_paths(expr.split_whitespace())
    }

    /// Build a selection from path strings using the `+`/`-` prefixes.
    pub fn from_paths<S: AsRef<str>>(paths: impl IntoIterator<Item = S>) -> Self {
        let mut selection = Self::new();
        for path in paths {
            let mut path = path.as_ref();
            if path.is_empty() {
                continue;
            }
            if let Some(forced) = path.strip_prefix('+') {
                selection.forced.push(forced.to_string());
                path = forced;
            }
            match path.strip_prefix('-') {
                Some(excluded) => selection.set(excluded, false),
                None => selection.set(path, true),
            }
        }
        selection
    }

    /// Normalize any of the accepted JSON shapes.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidSelection` for other shapes, or arrays
    /// holding non-strings.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        match value {
            Value::String(expr) => Ok(Self::parse(expr)),
            Value::Array(items) => {
                let paths = items
                    .iter()
                    .map(|item| {
                        item.as_str().ok_or_else(|| SchemaError::InvalidSelection {
                            actual: format!("array containing {}", json_type_name(item)),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::from_paths(paths))
            }
            Value::Object(map) => {
                let mut selection = Self::new();
                for (path, flag) in map {
                    selection.set(path, is_truthy(flag));
                }
                Ok(selection)
            }
            other => Err(SchemaError::InvalidSelection {
                actual: json_type_name(other).to_string(),
            }),
        }
    }

    pub fn include(mut self, path: impl AsRef<str>) -> Self {
        self.set(path.as_ref(), true);
        self
    }

    pub fn exclude(mut self, path: impl AsRef<str>) -> Self {
        self.set(path.as_ref(), false);
        self
    }

    /// Include `path` even if its field is hidden by default.
    pub fn force(mut self, path: impl AsRef<str>) -> Self {
        self.forced.push(path.as_ref().to_string());
        self.set(path.as_ref(), true);
        self
    }

    /// Decision recorded for exactly `path`.
    pub fn get(&self, path: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, included)| *included)
    }

    /// True when at least one path is included (allow-list mode).
    pub fn is_explicit_inclusion(&self) -> bool {
        self.entries.iter().any(|(_, included)| *included)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths with their decisions, in first-mention order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(p, included)| (p.as_str(), *included))
    }

    fn is_forced(&self, path: &str) -> bool {
        self.forced.iter().any(|p| p == path)
    }

    fn set(&mut self, path: &str, included: bool) {
        match self.entries.iter_mut().find(|(p, _)| p == path) {
            Some(entry) => entry.1 = included,
            None => self.entries.push((path.to_string(), included)),
        }
    }

    /// True if an included ancestor covers `path`.
    fn covers(&self, path: &str) -> bool {
        self.entries.iter().any(|(s, included)| {
            *included
                && path.len() > s.len()
                && path.starts_with(s.as_str())
                && path.as_bytes()[s.len()] == b'.'
        })
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Paths of type `id` that projection must remove for `selection`.
///
/// Deny-list mode yields the explicit exclusions plus fields hidden by
/// default and unexposed virtuals. Allow-list mode yields every addressable
/// path that is neither included nor under an included ancestor; `_id` is
/// included unless excluded, and so is its `id` alias when virtuals are
/// exposed.
pub fn excluded_paths(registry: &Registry, id: TypeId, selection: &Selection) -> Vec<String> {
    let ty = registry.type_of(id);
    let mut paths = all_paths(registry, id);

    let mut defaults: Vec<String> = paths
        .iter()
        .filter(|p| {
            !selection.is_forced(p)
                && lookup_field(registry, id, p).is_some_and(|d| d.constraints.hidden)
        })
        .cloned()
        .collect();

    let expose_virtuals = ty.options().expose_virtuals;
    let virtuals = ty.virtuals();
    paths.extend(virtuals.iter().cloned());
    if !expose_virtuals {
        defaults.extend(virtuals);
    }

    let explicit = selection.is_explicit_inclusion();
    let mut effective = selection.clone();
    for path in &defaults {
        effective.set(path, false);
    }

    if !explicit {
        return effective.entries.into_iter().map(|(p, _)| p).collect();
    }

    if ty.has_id() && effective.get(ID_FIELD).is_none() {
        effective.set(ID_FIELD, true);
    }
    if expose_virtuals && effective.get(ID_ALIAS).is_none() {
        if let Some(included) = effective.get(ID_FIELD) {
            effective.set(ID_ALIAS, included);
        }
    }

    paths
        .into_iter()
        .filter(|p| match effective.get(p) {
            Some(included) => !included,
            None => !effective.covers(p),
        })
        .collect()
}

/// Every addressable path of a type. Arrays of embedded sub-documents
/// contribute their sub-paths (`comment.body`) instead of their own path.
pub fn all_paths(registry: &Registry, id: TypeId) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(registry, id, "", &mut vec![id], &mut paths);
    paths
}

fn collect_paths(
    registry: &Registry,
    id: TypeId,
    prefix: &str,
    visiting: &mut Vec<TypeId>,
    paths: &mut Vec<String>,
) {
    for (path, descriptor) in registry.type_of(id).paths() {
        let full = format!("{}{}", prefix, path);
        let sub = document_array(descriptor)
            .and_then(|name| registry.id(name))
            .filter(|sub| !visiting.contains(sub));
        match sub {
            Some(sub) => {
                visiting.push(sub);
                collect_paths(registry, sub, &format!("{}.", full), visiting, paths);
                visiting.pop();
            }
            None => paths.push(full),
        }
    }
}

/// Descriptor declared at `path`, descending into embedded sub-documents.
pub fn lookup_field<'r>(
    registry: &'r Registry,
    id: TypeId,
    path: &str,
) -> Option<&'r FieldDescriptor> {
    let ty = registry.type_of(id);
    if let Some(descriptor) = ty.field(path) {
        return Some(descriptor);
    }

    let mut end = 0;
    while let Some(offset) = path[end..].find('.') {
        end += offset;
        let prefix = &path[..end];
        if let Some(sub) = ty
            .field(prefix)
            .and_then(sub_document)
            .and_then(|name| registry.id(name))
        {
            return lookup_field(registry, sub, &path[end + 1..]);
        }
        end += 1;
    }
    None
}

fn document_array(descriptor: &FieldDescriptor) -> Option<&str> {
    match &descriptor.kind {
        FieldKind::Array(item) => match &item.kind {
            FieldKind::Embedded(name) => Some(name),
            _ => None,
        },
        _ => None,
    }
}

fn sub_document(descriptor: &FieldDescriptor) -> Option<&str> {
    match &descriptor.kind {
        FieldKind::Embedded(name) => Some(name),
        _ => document_array(descriptor),
    }
}
