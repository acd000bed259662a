//! Flat storage properties and document metadata names.

use crate::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reserved metadata property names. Owned by the writer, never by input.
pub mod meta {
    /// Root segment shared by every metadata property.
    pub const ROOT: &str = "meta";
    pub const CREATED_AT: &str = "meta.createdAt";
    pub const UPDATED_AT: &str = "meta.updatedAt";
    pub const CREATED_BY: &str = "meta.createdBy";
    pub const UPDATED_BY: &str = "meta.updatedBy";
    pub const VERSION: &str = "meta.version";
    pub const STATUS: &str = "meta.status";
}

/// The smallest unit the store persists.
///
/// Multi-valued fields expand to one property per element, all sharing
/// the field name. Nested fields use dot-joined names (`address.city`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub no_index: bool,
}

impl Property {
    /// Creates a single-valued, indexed property.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            multiple: false,
            no_index: false,
        }
    }

    #[must_use]
    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    #[must_use]
    pub fn with_no_index(mut self, no_index: bool) -> Self {
        self.no_index = no_index;
        self
    }

    /// First segment of the dotted name.
    pub fn root(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }

    /// True for writer-owned `meta.*` properties.
    pub fn is_meta(&self) -> bool {
        self.root() == meta::ROOT
    }
}

/// Lifecycle status stored in `meta.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The live record.
    Active,
    /// Saved but not published.
    Draft,
    /// A superseded version retained under a child key.
    Archived,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draft => "draft",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "draft" => Ok(Self::Draft),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

impl From<Status> for Value {
    fn from(status: Status) -> Self {
        Value::String(status.as_str().to_string())
    }
}
