//! Model checking - compiles every registered type and reports problems.
//!
//! Reports:
//! - types that fail to compile (unknown embedded types, path conflicts)
//! - references to types that aren't registered (never expandable)
//! - self-referential types, whose schemas rely on `$ref` to an `id`

use serde::Serialize;
use serde_json::Value;

use crate::path::escape_token;
use crate::registry::Registry;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message for one type.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// JSON Pointer into the compiled schema (e.g., "/properties/author/items")
    pub path: String,
    pub message: String,
}

/// Status of a checked type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeStatus {
    Ok,
    Error,
    Warning,
}

/// Result of checking a single type.
#[derive(Debug, Clone, Serialize)]
pub struct TypeResult {
    pub name: String,
    pub status: TypeStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of checking every type of a registry.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub types_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<TypeResult>,
}

impl CheckResult {
    /// Returns true if no type failed to compile.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Check every registered type, in registration order.
///
/// If `strict` is true, types with warnings count as failed.
pub fn check(registry: &mut Registry, strict: bool) -> CheckResult {
    let names: Vec<String> = registry.names().map(str::to_string).collect();
    let results: Vec<TypeResult> = names
        .iter()
        .map(|name| check_type(registry, name))
        .collect();

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != TypeStatus::Ok
            } else {
                r.status == TypeStatus::Error
            }
        })
        .count();

    CheckResult {
        types_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Compile a single type and inspect its schema.
pub fn check_type(registry: &mut Registry, name: &str) -> TypeResult {
    let mut diagnostics = Vec::new();

    match registry.schema(name, Some(name)) {
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E001".to_string(),
            path: String::new(),
            message: e.to_string(),
        }),
        Ok(schema) => {
            if let Some(id) = schema.get("id").and_then(Value::as_str) {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    code: "W002".to_string(),
                    path: String::new(),
                    message: format!("type is self-referential; nested copies use $ref to '{}'", id),
                });
            }
            check_refs(registry, &schema, "", &mut diagnostics);
        }
    }

    let status = if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        TypeStatus::Error
    } else if diagnostics.is_empty() {
        TypeStatus::Ok
    } else {
        TypeStatus::Warning
    };

    TypeResult {
        name: name.to_string(),
        status,
        diagnostics,
    }
}

fn check_refs(registry: &Registry, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    match value {
        Value::Object(map) => {
            if let Some(target) = map.get("x-ref").and_then(Value::as_str) {
                if registry.id(target).is_none() {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        code: "W001".to_string(),
                        path: path.to_string(),
                        message: format!("reference to unregistered type '{}' cannot be populated", target),
                    });
                }
            }
            for (key, child) in map {
                check_refs(registry, child, &format!("{}/{}", path, escape_token(key)), diagnostics);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_refs(registry, item, &format!("{}/{}", path, i), diagnostics);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentType, FieldDescriptor};

    fn registry(types: Vec<DocumentType>) -> Registry {
        let mut registry = Registry::new();
        for ty in types {
            registry.register(ty).unwrap();
        }
        registry
    }

    #[test]
    fn check_valid_types() {
        let mut registry = registry(vec![
            DocumentType::builder("Person")
                .field("name", FieldDescriptor::string())
                .build(),
            DocumentType::builder("Book")
                .field("author", FieldDescriptor::reference("Person"))
                .build(),
        ]);
        let result = check(&mut registry, false);
        assert!(result.is_ok());
        assert_eq!(result.types_checked, 2);
        assert_eq!(result.passed, 2);
        assert!(result.results.iter().all(|r| r.status == TypeStatus::Ok));
    }

    #[test]
    fn check_unknown_embedded_type() {
        let mut registry = registry(vec![DocumentType::builder("Book")
            .field("part", FieldDescriptor::embedded("Missing"))
            .build()]);
        let result = check(&mut registry, false);
        assert!(!result.is_ok());
        assert_eq!(result.failed, 1);
        assert_eq!(result.results[0].diagnostics[0].code, "E001");
    }

    #[test]
    fn check_dangling_reference() {
        let mut registry = registry(vec![DocumentType::builder("Book")
            .field(
                "author",
                FieldDescriptor::array_of(FieldDescriptor::reference("Person")),
            )
            .build()]);
        let result = check_type(&mut registry, "Book");
        assert_eq!(result.status, TypeStatus::Warning);
        assert_eq!(result.diagnostics[0].code, "W001");
        assert_eq!(result.diagnostics[0].path, "/properties/author/items");
    }

    #[test]
    fn check_self_reference_warns() {
        let mut registry = registry(vec![DocumentType::builder("Node")
            .field("child", FieldDescriptor::embedded("Node"))
            .build()]);
        let result = check_type(&mut registry, "Node");
        assert_eq!(result.status, TypeStatus::Warning);
        assert_eq!(result.diagnostics[0].code, "W002");
    }

    #[test]
    fn check_strict_mode() {
        let mut registry = registry(vec![DocumentType::builder("Node")
            .field("child", FieldDescriptor::embedded("Node"))
            .build()]);
        assert_eq!(check(&mut registry, false).failed, 0);
        let strict = check(&mut registry, true);
        assert_eq!(strict.failed, 1);
        assert!(strict.is_ok());
    }
}
