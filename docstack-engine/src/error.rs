//! Error types for the engine.

use docstack_model::{FieldError, SchemaError, Scope};
use docstack_storage::StorageError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while preparing, saving or committing a record.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Schema misconfiguration.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A single field rejected its input or failed the required check.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// The caller may not perform `scope` on this entity at all.
    #[error("{entity} {scope} permission denied")]
    Forbidden { entity: String, scope: Scope },

    /// The naming function produced an empty name.
    #[error("name function for '{entity}' produced an empty name")]
    InvalidName { entity: String },

    /// Every candidate name collided with an existing record.
    #[error("no free name for '{entity}' after {attempts} attempts")]
    NameAllocationExhausted { entity: String, attempts: u32 },

    /// A concurrent writer modified the record; retry the whole operation.
    #[error("conflicting concurrent modification of {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The request body is not a JSON object.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The request was cancelled or ran past its deadline.
    #[error("operation cancelled")]
    Cancelled,

    /// A lifecycle hook rejected the operation.
    #[error("rejected by hook: {0}")]
    Hook(String),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl EngineError {
    /// True when repeating the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// True for entity-level and field-level permission failures.
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            Self::Forbidden { .. } | Self::Field(FieldError::Forbidden { .. })
        )
    }

    /// The field error, if this is one.
    pub fn field_error(&self) -> Option<&FieldError> {
        match self {
            Self::Field(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(key) => Self::Conflict(key),
            StorageError::NotFound(key) => Self::NotFound(key),
            StorageError::InvalidKey(e) => Self::InvalidKey(e.to_string()),
            other => Self::Storage(other),
        }
    }
}
