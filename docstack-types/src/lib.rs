//! Core type definitions for docstack.
//!
//! This crate defines the storage-level vocabulary shared by every other
//! crate in the workspace:
//! - [`Key`] identifiers (named or UUID v7, optionally parented) and their
//!   opaque string encoding
//! - the tagged [`Value`] union that replaces untyped input maps
//! - [`Property`], the flat `(name, value, multiple, no_index)` storage unit
//! - document [`Status`] and the reserved `meta.*` property names
//!
//! Schema concepts (fields, entities, access rules) live in `docstack-model`.

mod key;
mod property;
mod value;

pub use key::{Key, KeyId};
pub use property::{Property, Status, meta};
pub use value::{Map, Value};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
