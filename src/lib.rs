//! Document Schema Compiler
//!
//! Compiles document type descriptions (typed fields, references, embedded
//! sub-documents) into JSON Schemas.
//!
//! Each access can reshape the compiled schema:
//! projection keeps or drops requested fields, population expands reference
//! fields into the referenced type's schema, and redaction removes fields
//! matching path patterns (e.g. read-only fields).
//!
//! # Example
//!
//! ```
//! use doc_schema::{DescribeRequest, DocumentType, FieldDescriptor, PopulationSpec, Registry, Selection};
//! use serde_json::json;
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     DocumentType::builder("Person")
//!         .field("name", FieldDescriptor::string().required())
//!         .build(),
//! ).unwrap();
//! registry.register(
//!     DocumentType::builder("Book")
//!         .field("title", FieldDescriptor::string().required())
//!         .field("year", FieldDescriptor::number())
//!         .field("author", FieldDescriptor::array_of(FieldDescriptor::reference("Person")))
//!         .build(),
//! ).unwrap();
//!
//! let request = DescribeRequest::new()
//!     .select(Selection::parse("title author"))
//!     .populate(PopulationSpec::parse("author"));
//! let schema = registry.describe("Book", &request).unwrap();
//!
//! assert_eq!(schema["title"], json!("Book"));
//! assert!(schema["properties"].get("year").is_none());
//! assert_eq!(schema["properties"]["author"]["items"]["title"], json!("Person"));
//! ```
//!
//! # Field Kinds
//!
//! | Kind | Emitted fragment |
//! |------|------------------|
//! | scalar | `{ "type": "string" \| "number" \| "boolean" }` |
//! | date | `{ "type": "string", "format": "date-time" }` |
//! | reference | `{ "type": "string", "pattern": <24 hex digits>, "x-ref": <type> }` |
//! | array | `{ "type": "array", "items": ... }` |
//! | map | `{ "type": "object", "additionalProperties": ... }` |
//! | embedded | schema of the embedded type, `$ref` on cycles |
//! | mixed | `{}` |
//!
//! # Selection Forms
//!
//! ```json
//! "title -year +password"
//! ["title", "-year"]
//! { "title": 1, "year": 0 }
//! ```

mod checker;
mod config;
mod error;
mod loader;
mod path;
mod population;
mod projection;
mod query;
mod redaction;
mod registry;
mod selection;
mod translator;
mod types;

pub use checker::{check, check_type, CheckResult, Diagnostic, Severity, TypeResult, TypeStatus};
pub use config::{Config, FieldOptionsMapping, FIELD_OPTIONS_MAPPING, FORCE_REBUILD};
pub use error::{ConfigError, LoadError, SchemaError};
pub use loader::{load_config, load_models, load_models_str, parse_field, parse_models};
pub use path::{ensure, resolve, PathResolution, PathSlot};
pub use population::{expand, PopulationSpec};
pub use projection::{delete_path, strip_required};
pub use query::{pluralize, Query, QueryKind};
pub use redaction::{redact, RedactionRule};
pub use registry::{DescribeRequest, Registry, TypeId};
pub use selection::{all_paths, excluded_paths, lookup_field, Selection};
pub use translator::{regex_source, EmbeddedSchemas, Translated, Translator, ITEM_TITLE_PREFIX};
pub use types::{
    has_type, json_type_name, Constraints, DocumentType, DocumentTypeBuilder, FieldDescriptor,
    FieldKind, MapValues, ScalarType, TypeOptions, ID_ALIAS, ID_FIELD, ID_PATTERN,
};
