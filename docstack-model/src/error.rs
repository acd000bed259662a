//! Error types for schema compilation and field parsing.

use crate::Scope;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema misconfiguration, detected once at startup.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("entity name '{0}' must contain a-zA-Z characters only")]
    InvalidEntityName(String),

    #[error("entity name '{0}' is reserved")]
    ReservedEntityName(String),

    #[error("entity '{0}' is already registered")]
    DuplicateEntity(String),

    #[error("field name can't be empty")]
    EmptyFieldName,

    #[error("field name '{0}' is reserved")]
    ReservedFieldName(String),

    #[error("field name '{0}' can't begin with an underscore")]
    UnderscoreFieldName(String),

    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("fields '{first}' and '{second}' both claim to provide the entity name")]
    MultipleNameProviders { first: String, second: String },

    #[error("field '{field}' has an invalid validation pattern: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("field '{field}' has an invalid default: {reason}")]
    InvalidDefault { field: String, reason: String },

    #[error("schema parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A value rejected by a field's pipeline.
///
/// Messages name the field but never echo the rejected value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field '{field}' {scope} permission denied")]
    Forbidden { field: String, scope: Scope },

    #[error("field '{field}' value is required")]
    Required { field: String },

    #[error("field '{field}' value type '{found}' is not valid")]
    TypeMismatch { field: String, found: String },

    #[error("field '{field}' value is not valid: {reason}")]
    Invalid { field: String, reason: String },
}

impl FieldError {
    /// Name of the field the error refers to.
    pub fn field(&self) -> &str {
        match self {
            Self::Forbidden { field, .. }
            | Self::Required { field }
            | Self::TypeMismatch { field, .. }
            | Self::Invalid { field, .. } => field,
        }
    }
}
