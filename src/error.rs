//! Error types for schema compilation, configuration and model loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating configuration values.
///
/// These surface at configuration time and never corrupt a previously
/// applied configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "fieldsMapping Error: Wrong type of option value. \
         Expected: {{ [key: string]: string }} | Array<string|[string, string]>"
    )]
    InvalidFieldOptionsMapping,

    #[error("invalid value for option '{option}': expected {expected}, got {actual}")]
    InvalidOption {
        option: String,
        expected: &'static str,
        actual: String,
    },

    #[error("unknown configuration option '{option}'")]
    UnknownOption { option: String },
}

/// Errors raised by the model description or the schema compiler.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown document type '{name}'")]
    UnknownType { name: String },

    #[error("document type '{name}' is already registered")]
    DuplicateType { name: String },

    #[error("cannot map field '{field}' of type '{kind}' to a schema")]
    UnmappableField { field: String, kind: String },

    #[error("invalid option '{option}' on field '{field}': expected {expected}, got {actual}")]
    InvalidFieldOption {
        field: String,
        option: String,
        expected: &'static str,
        actual: String,
    },

    #[error("field path '{path}' passes through a non-object field")]
    PathConflict { path: String },

    #[error("invalid field selection: expected string, array or object, got {actual}")]
    InvalidSelection { actual: String },

    #[error("invalid population: {message}")]
    InvalidPopulation { message: String },

    #[error("invalid redaction pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid model description: {message}")]
    InvalidModel { message: String },
}

/// Errors while loading model descriptions or configuration documents.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            LoadError::Schema(e) => e.exit_code(),
            LoadError::Config(e) => e.exit_code(),
            LoadError::InvalidJson { .. } => 2,
        }
    }
}
