//! Schemas of query results.
//!
//! A single-result lookup returns the described document type without a
//! top-level `required` list. A multi-result query wraps it as
//! `{ "title": "List of <Plural>", "type": "array", "items": ... }`.

use serde_json::{json, Value};

use crate::error::SchemaError;
use crate::population::PopulationSpec;
use crate::registry::{DescribeRequest, Registry};
use crate::selection::Selection;

/// How many documents a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Single-result lookup.
    FindOne,
    /// Multi-result query, optionally capped.
    Find { limit: Option<u64> },
}

/// A query against one document type.
#[derive(Debug, Clone)]
pub struct Query {
    model: String,
    kind: QueryKind,
    request: DescribeRequest,
}

impl Query {
    pub fn find_one(model: impl Into<String>) -> Self {
        Self::new(model, QueryKind::FindOne)
    }

    pub fn find(model: impl Into<String>) -> Self {
        Self::new(model, QueryKind::Find { limit: None })
    }

    pub fn new(model: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            model: model.into(),
            kind,
            request: DescribeRequest::default(),
        }
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.request.select = Some(selection);
        self
    }

    pub fn populate(mut self, specs: Vec<PopulationSpec>) -> Self {
        self.request.populate = specs;
        self
    }

    /// Use `request` for describing the model (selection, population and
    /// redaction).
    pub fn request(mut self, request: DescribeRequest) -> Self {
        self.request = request;
        self
    }

    /// Cap the number of results. Ignored for single-result lookups.
    pub fn limit(mut self, limit: u64) -> Self {
        if let QueryKind::Find { limit: current } = &mut self.kind {
            *current = Some(limit);
        }
        self
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Schema of the query result.
    ///
    /// # Errors
    ///
    /// Returns the error raised while describing the model.
    pub fn schema(&self, registry: &mut Registry) -> Result<Value, SchemaError> {
        let mut schema = registry.describe(&self.model, &self.request)?;
        let Value::Object(map) = &mut schema else {
            return Ok(schema);
        };
        map.remove("required");

        let QueryKind::Find { limit } = self.kind else {
            return Ok(schema);
        };
        map.remove("title");

        let mut list = json!({
            "title": format!("List of {}", pluralize(&self.model)),
            "type": "array",
            "items": schema,
        });
        if let Some(limit) = limit {
            list["maxItems"] = json!(limit);
        }
        Ok(list)
    }
}

/// English plural of a type name, keeping its case (`Person` becomes
/// `People`).
pub fn pluralize(word: &str) -> String {
    pluralizer::pluralize(word, 2, false)
}
