//! Document type descriptions consumed by the schema compiler.
//!
//! A [`DocumentType`] is an ordered list of field paths, each described by a
//! [`FieldDescriptor`]. The descriptor's [`FieldKind`] is decided once, when the
//! descriptor is constructed, and the translator dispatches on it.

use serde_json::{Map, Number, Value};

/// Pattern matching a 24-hex-digit record identifier.
pub const ID_PATTERN: &str = "^[0-9a-fA-F]{24}$";

/// Name of the identifier field every document type carries by default.
pub const ID_FIELD: &str = "_id";

/// Name of the virtual alias of the identifier field.
pub const ID_ALIAS: &str = "id";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Returns true if the fragment's `type` is `name`, either directly or as a
/// member of a nullable union such as `["object", "null"]`.
pub fn has_type(fragment: &Value, name: &str) -> bool {
    match fragment.get("type") {
        Some(Value::String(t)) => t == name,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(name)),
        _ => false,
    }
}

/// Primitive schema types a scalar field maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Number,
    Boolean,
}

impl ScalarType {
    /// Returns the JSON Schema type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Boolean => "boolean",
        }
    }

    /// Parse a scalar type name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Some(ScalarType::String),
            "number" => Some(ScalarType::Number),
            "boolean" => Some(ScalarType::Boolean),
            _ => None,
        }
    }
}

/// Value shape of a map field.
#[derive(Debug, Clone, PartialEq)]
pub enum MapValues {
    /// No value descriptor: emits `additionalProperties: { "type": {} }`.
    Any,
    /// Explicitly unconstrained: emits `additionalProperties: true`.
    Unconstrained,
    /// Values follow the given descriptor.
    Of(Box<FieldDescriptor>),
}

/// The closed set of field shapes the translator understands.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Date,
    /// Identifier of another record, optionally annotated with its type.
    Reference { target: Option<String> },
    Array(Box<FieldDescriptor>),
    Map(MapValues),
    /// Inline embedded object with ordered children.
    Object(Vec<(String, FieldDescriptor)>),
    /// Embedded sub-document whose shape is another registered type.
    Embedded(String),
    /// Untyped escape hatch, optionally with a declared shape.
    Mixed(Option<Box<FieldDescriptor>>),
}

impl FieldKind {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Scalar(t) => t.type_name(),
            FieldKind::Date => "date",
            FieldKind::Reference { .. } => "reference",
            FieldKind::Array(_) => "array",
            FieldKind::Map(_) => "map",
            FieldKind::Object(_) => "object",
            FieldKind::Embedded(_) => "embedded",
            FieldKind::Mixed(_) => "mixed",
        }
    }
}

/// Constraints and metadata attached to a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub required: bool,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    /// Match rule, either a bare pattern or a `/source/flags` literal.
    pub pattern: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    /// `Some(Value::Null)` marks the field nullable.
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Short alias of `description`, consulted when `description` is absent.
    pub descr: Option<String>,
    pub title: Option<String>,
    /// Deselected unless a selection forces it with `+path`.
    pub hidden: bool,
    /// Never emitted, regardless of selection.
    pub exclude_from_schema: bool,
    /// Custom options, available to the field options mapping.
    pub metadata: Map<String, Value>,
}

/// Declarative metadata for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    pub constraints: Constraints,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            constraints: Constraints::default(),
        }
    }

    pub fn string() -> Self {
        Self::new(FieldKind::Scalar(ScalarType::String))
    }

    pub fn number() -> Self {
        Self::new(FieldKind::Scalar(ScalarType::Number))
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Scalar(ScalarType::Boolean))
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    /// Reference to another record, annotated with the referenced type.
    pub fn reference(target: impl Into<String>) -> Self {
        Self::new(FieldKind::Reference {
            target: Some(target.into()),
        })
    }

    /// Plain identifier without a known target type.
    pub fn object_id() -> Self {
        Self::new(FieldKind::Reference { target: None })
    }

    pub fn array_of(item: FieldDescriptor) -> Self {
        Self::new(FieldKind::Array(Box::new(item)))
    }

    pub fn map_of(values: FieldDescriptor) -> Self {
        Self::new(FieldKind::Map(MapValues::Of(Box::new(values))))
    }

    pub fn map() -> Self {
        Self::new(FieldKind::Map(MapValues::Any))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, FieldDescriptor)>) -> Self {
        Self::new(FieldKind::Object(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn embedded(type_name: impl Into<String>) -> Self {
        Self::new(FieldKind::Embedded(type_name.into()))
    }

    pub fn mixed() -> Self {
        Self::new(FieldKind::Mixed(None))
    }

    pub fn required(mut self) -> Self {
        self.constraints.required = true;
        self
    }

    pub fn min(mut self, value: impl Into<Number>) -> Self {
        self.constraints.minimum = Some(value.into());
        self
    }

    pub fn max(mut self, value: impl Into<Number>) -> Self {
        self.constraints.maximum = Some(value.into());
        self
    }

    pub fn min_length(mut self, value: u64) -> Self {
        self.constraints.min_length = Some(value);
        self
    }

    pub fn max_length(mut self, value: u64) -> Self {
        self.constraints.max_length = Some(value);
        self
    }

    pub fn pattern(mut self, rule: impl Into<String>) -> Self {
        self.constraints.pattern = Some(rule.into());
        self
    }

    pub fn one_of<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.constraints.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.constraints.default = Some(value.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.constraints.description = Some(text.into());
        self
    }

    pub fn title(mut self, text: impl Into<String>) -> Self {
        self.constraints.title = Some(text.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.constraints.hidden = true;
        self
    }

    pub fn exclude_from_schema(mut self) -> Self {
        self.constraints.exclude_from_schema = true;
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.metadata.insert(key.into(), value.into());
        self
    }

    /// Look up a descriptor option by its declaration name.
    ///
    /// Used by the field options mapping to copy options onto fragments.
    pub fn option(&self, name: &str) -> Option<Value> {
        let c = &self.constraints;
        match name {
            "required" => c.required.then_some(Value::Bool(true)),
            "min" => c.minimum.clone().map(Value::Number),
            "max" => c.maximum.clone().map(Value::Number),
            "minLength" => c.min_length.map(Value::from),
            "maxLength" => c.max_length.map(Value::from),
            "match" => c.pattern.clone().map(Value::String),
            "enum" => c.enum_values.clone().map(Value::Array),
            "default" => c.default.clone(),
            "description" => c.description.clone().map(Value::String),
            "descr" => c.descr.clone().map(Value::String),
            "title" => c.title.clone().map(Value::String),
            "select" => c.hidden.then_some(Value::Bool(false)),
            "ref" => match &self.kind {
                FieldKind::Reference { target: Some(t) } => Some(Value::String(t.clone())),
                _ => None,
            },
            other => c.metadata.get(other).cloned(),
        }
    }

    /// True when the descriptor is an unconstrained inline object, which is
    /// flattened into dotted paths when added to a document type.
    fn is_plain_object(&self) -> bool {
        matches!(self.kind, FieldKind::Object(_)) && self.constraints == Constraints::default()
    }
}

/// Per-type output options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeOptions {
    /// Append the `_id` identifier field (and its `id` virtual alias).
    pub id: bool,
    /// Append a numeric version key field, e.g. `__v`.
    pub version_key: Option<String>,
    /// Emit virtual fields as accept-anything placeholders.
    pub expose_virtuals: bool,
}

impl Default for TypeOptions {
    fn default() -> Self {
        Self {
            id: true,
            version_key: None,
            expose_virtuals: false,
        }
    }
}

/// A named record shape.
#[derive(Debug, Clone)]
pub struct DocumentType {
    name: String,
    fields: Vec<(String, FieldDescriptor)>,
    implicit: Vec<(String, FieldDescriptor)>,
    virtuals: Vec<String>,
    options: TypeOptions,
}

impl DocumentType {
    /// Create an empty document type with default options.
    pub fn new(name: impl Into<String>) -> Self {
        let mut ty = Self {
            name: name.into(),
            fields: Vec::new(),
            implicit: Vec::new(),
            virtuals: Vec::new(),
            options: TypeOptions::default(),
        };
        ty.refresh_implicit();
        ty
    }

    pub fn builder(name: impl Into<String>) -> DocumentTypeBuilder {
        DocumentTypeBuilder {
            ty: Self::new(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &TypeOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: TypeOptions) {
        self.options = options;
        self.refresh_implicit();
    }

    /// Add a field at `path`.
    ///
    /// Unconstrained inline objects are flattened: each child is added at
    /// `path.child`. An inline object without children becomes a mixed field.
    pub fn add(&mut self, path: impl Into<String>, descriptor: FieldDescriptor) {
        let path = path.into();
        if descriptor.is_plain_object() {
            if let FieldKind::Object(children) = descriptor.kind {
                if children.is_empty() {
                    self.push_field(path, FieldDescriptor::mixed());
                    return;
                }
                for (child, child_descriptor) in children {
                    self.add(format!("{}.{}", path, child), child_descriptor);
                }
                return;
            }
        }
        self.push_field(path, descriptor);
    }

    /// Declare a virtual (computed) field.
    pub fn add_virtual(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.virtuals.contains(&name) {
            self.virtuals.push(name);
        }
    }

    /// All field paths in declaration order, followed by the implicit
    /// identifier and version key fields.
    pub fn paths(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields
            .iter()
            .chain(self.implicit.iter())
            .map(|(p, d)| (p.as_str(), d))
    }

    /// Look up the descriptor declared at exactly `path`.
    pub fn field(&self, path: &str) -> Option<&FieldDescriptor> {
        self.paths().find(|(p, _)| *p == path).map(|(_, d)| d)
    }

    /// Virtual field names, including the identifier alias when the type has
    /// an identifier.
    pub fn virtuals(&self) -> Vec<String> {
        let mut virtuals = self.virtuals.clone();
        if self.has_id() && !virtuals.iter().any(|v| v == ID_ALIAS) {
            virtuals.push(ID_ALIAS.to_string());
        }
        virtuals
    }

    /// True if the type exposes an `_id` field.
    pub fn has_id(&self) -> bool {
        self.field(ID_FIELD).is_some()
    }

    fn push_field(&mut self, path: String, descriptor: FieldDescriptor) {
        match self.fields.iter_mut().find(|(p, _)| *p == path) {
            Some(slot) => slot.1 = descriptor,
            None => self.fields.push((path, descriptor)),
        }
        self.refresh_implicit();
    }

    fn refresh_implicit(&mut self) {
        let declared = |name: &str| self.fields.iter().any(|(p, _)| p == name);
        let mut implicit = Vec::new();
        if self.options.id && !declared(ID_FIELD) {
            implicit.push((ID_FIELD.to_string(), FieldDescriptor::object_id()));
        }
        if let Some(key) = &self.options.version_key {
            if !declared(key) {
                implicit.push((key.clone(), FieldDescriptor::number()));
            }
        }
        self.implicit = implicit;
    }
}

/// Builder for [`DocumentType`].
#[derive(Debug, Clone)]
pub struct DocumentTypeBuilder {
    ty: DocumentType,
}

impl DocumentTypeBuilder {
    pub fn field(mut self, path: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.ty.add(path, descriptor);
        self
    }

    pub fn virtual_field(mut self, name: impl Into<String>) -> Self {
        self.ty.add_virtual(name);
        self
    }

    /// Disable the implicit `_id` field.
    pub fn without_id(mut self) -> Self {
        self.ty.options.id = false;
        self
    }

    pub fn version_key(mut self, key: impl Into<String>) -> Self {
        self.ty.options.version_key = Some(key.into());
        self
    }

    pub fn expose_virtuals(mut self, expose: bool) -> Self {
        self.ty.options.expose_virtuals = expose;
        self
    }

    pub fn build(mut self) -> DocumentType {
        self.ty.refresh_implicit();
        self.ty
    }
}
