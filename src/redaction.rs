//! Removing fields by path pattern, independent of selection.
//!
//! Typically used to hide read-only fields from input schemas.

use log::trace;
use regex::Regex;
use serde_json::Value;

use crate::error::SchemaError;
use crate::projection::remove_required;
use crate::types::has_type;

/// A pattern matched against full dotted field paths.
///
/// Matching is unanchored: `^_id$` matches only the root identifier, `_id`
/// matches identifiers at every depth.
#[derive(Debug, Clone)]
pub struct RedactionRule {
    pattern: Regex,
    pub strict: bool,
    pub message: Option<String>,
}

impl RedactionRule {
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidPattern` if `pattern` isn't a valid regex.
    pub fn new(pattern: &str) -> Result<Self, SchemaError> {
        let pattern = Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            strict: false,
            message: None,
        })
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

/// Remove every property whose dotted path matches one of `rules`.
pub fn redact(schema: &mut Value, rules: &[RedactionRule]) {
    redact_under(schema, rules, "");
}

fn redact_under(fragment: &mut Value, rules: &[RedactionRule], prefix: &str) {
    if has_type(fragment, "array") {
        if let Some(items) = fragment.get_mut("items") {
            redact_under(items, rules, prefix);
        }
        return;
    }

    let Some(object) = fragment.as_object_mut() else {
        return;
    };
    let names: Vec<String> = match object.get("properties") {
        Some(Value::Object(properties)) => properties.keys().cloned().collect(),
        _ => return,
    };

    for name in names {
        let path = format!("{}{}", prefix, name);
        if rules.iter().any(|rule| rule.matches(&path)) {
            trace!("redacted '{}'", path);
            if let Some(Value::Object(properties)) = object.get_mut("properties") {
                properties.remove(&name);
            }
            remove_required(object, &name);
            continue;
        }

        if let Some(property) = object
            .get_mut("properties")
            .and_then(|p| p.get_mut(&name))
        {
            if has_type(property, "object") || has_type(property, "array") {
                redact_under(property, rules, &format!("{}.", path));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "title": "Book",
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "createdAt": { "type": "string", "format": "date-time" },
                "comment": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "body": { "type": "string" },
                            "_id": { "type": "string" }
                        },
                        "required": ["_id"]
                    }
                },
                "_id": { "type": "string" }
            },
            "required": ["title", "_id"]
        })
    }

    fn rules(patterns: &[&str]) -> Vec<RedactionRule> {
        patterns
            .iter()
            .map(|p| RedactionRule::new(p).unwrap())
            .collect()
    }

    #[test]
    fn removes_matching_root_fields() {
        let mut schema = schema();
        redact(&mut schema, &rules(&["^_id$", "^createdAt$"]));
        assert!(schema["properties"].get("_id").is_none());
        assert!(schema["properties"].get("createdAt").is_none());
        assert_eq!(schema["required"], json!(["title"]));
        assert!(schema["properties"]["comment"]["items"]["properties"]
            .get("_id")
            .is_some());
    }

    #[test]
    fn unanchored_patterns_match_nested_paths() {
        let mut schema = schema();
        redact(&mut schema, &rules(&["_id$"]));
        let items = &schema["properties"]["comment"]["items"];
        assert!(items["properties"].get("_id").is_none());
        assert!(items.get("required").is_none());
        assert!(schema["properties"].get("_id").is_none());
    }

    #[test]
    fn nested_paths_use_dotted_prefix() {
        let mut schema = schema();
        redact(&mut schema, &rules(&["^comment\\.body$"]));
        let items = &schema["properties"]["comment"]["items"];
        assert!(items["properties"].get("body").is_none());
        assert!(items["properties"].get("_id").is_some());
    }

    #[test]
    fn no_rules_leave_schema_untouched() {
        let mut redacted = schema();
        redact(&mut redacted, &[]);
        assert_eq!(redacted, schema());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(matches!(
            RedactionRule::new("("),
            Err(SchemaError::InvalidPattern { pattern, .. }) if pattern == "("
        ));
    }

    #[test]
    fn rule_options() {
        let rule = RedactionRule::new("^_id$")
            .unwrap()
            .strict(true)
            .message("read only");
        assert!(rule.strict);
        assert_eq!(rule.message.as_deref(), Some("read only"));
        assert_eq!(rule.pattern(), "^_id$");
    }
}
