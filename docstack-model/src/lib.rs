//! Schema model for docstack.
//!
//! Defines the compile-once, share-everywhere schema types:
//! - [`Field`]: one attribute with its type, multiplicity, validation, transform,
//!   default and per-scope access rules
//! - [`Entity`]: an ordered, validated set of fields plus entity-level
//!   rules, lifecycle hooks and an optional naming strategy
//! - [`Role`], [`Scope`], [`Rules`], [`RankTable`]: the access model
//! - strategy traits ([`Validator`], [`Transformer`], [`Defaulter`],
//!   [`NameFunc`]) with built-in implementations
//! - [`SchemaRegistry`]: the explicit registry built at startup
//! - [`SchemaFile`]: serializable schema definitions loadable from TOML
//!
//! Everything here is immutable after compilation and safe to share across
//! concurrent requests. Per-request state lives in `docstack-engine`.

mod access;
mod context;
mod definition;
mod entity;
mod error;
mod field;
mod hooks;
mod registry;
pub mod strategy;

pub use access::{RankTable, Role, Rules, Scope};
pub use context::RequestContext;
pub use definition::{DefaultKind, EntityDefinition, FieldDefinition, SchemaFile, TransformKind};
pub use entity::{Entity, EntityBuilder};
pub use error::{FieldError, SchemaError, SchemaResult};
pub use field::{Field, FieldType};
pub use hooks::{EntityHooks, NoHooks};
pub use registry::SchemaRegistry;
pub use strategy::{Defaulter, NameFunc, Transformer, Validator};
