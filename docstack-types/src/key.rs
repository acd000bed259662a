//! Storage keys.
//!
//! A key names one record: a kind (the entity name), an identifier that is
//! either a caller-chosen name or a generated UUID v7, and an optional
//! parent key. Archived versions of a record are stored under child keys
//! of the live record.
//!
//! The encoded form is a `/`-separated path from the root ancestor down,
//! one segment per key: `kind:name` for named keys and `kind@uuid` for
//! generated ones. Kinds and names are percent-encoded so that the
//! separators never appear inside a segment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The identifying part of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyId {
    /// Caller-chosen string name (e.g. a slug from a name-provider field).
    Name(String),
    /// Generated identifier.
    Id(Uuid),
}

/// Identifier of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    kind: String,
    id: KeyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<Box<Key>>,
}

impl Key {
    /// Creates a key identified by name.
    #[must_use]
    pub fn named(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: KeyId::Name(name.into()),
            parent: None,
        }
    }

    /// Creates a key with a freshly generated, time-ordered id.
    #[must_use]
    pub fn generated(kind: impl Into<String>) -> Self {
        Self::from_uuid(kind, Uuid::now_v7())
    }

    /// Creates a key from an existing UUID.
    #[must_use]
    pub fn from_uuid(kind: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            kind: kind.into(),
            id: KeyId::Id(uuid),
            parent: None,
        }
    }

    /// Returns this key re-rooted under `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: Key) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// The kind (entity name) this key belongs to.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// The string name, if this is a named key.
    pub fn name(&self) -> Option<&str> {
        match &self.id {
            KeyId::Name(name) => Some(name),
            KeyId::Id(_) => None,
        }
    }

    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// Encodes the key into its opaque string form.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut String) {
        if let Some(parent) = &self.parent {
            parent.encode_into(out);
            out.push('/');
        }
        out.push_str(&urlencoding::encode(&self.kind));
        match &self.id {
            KeyId::Name(name) => {
                out.push(':');
                out.push_str(&urlencoding::encode(name));
            }
            KeyId::Id(uuid) => {
                out.push('@');
                out.push_str(&uuid.to_string());
            }
        }
    }

    /// Decodes a key previously produced by [`Key::encode`].
    pub fn decode(encoded: &str) -> Result<Self> {
        if encoded.is_empty() {
            return Err(Error::InvalidKey("empty key".to_string()));
        }

        let mut key: Option<Key> = None;
        for segment in encoded.split('/') {
            let mut next = decode_segment(segment)?;
            if let Some(parent) = key.take() {
                next.parent = Some(Box::new(parent));
            }
            key = Some(next);
        }

        key.ok_or_else(|| Error::InvalidKey(encoded.to_string()))
    }
}

fn decode_segment(segment: &str) -> Result<Key> {
    let split = segment
        .find([':', '@'])
        .ok_or_else(|| Error::InvalidKey(format!("segment '{segment}' has no id")))?;
    let (raw_kind, rest) = segment.split_at(split);
    let kind = percent_decode(raw_kind)?;
    if kind.is_empty() {
        return Err(Error::InvalidKey(format!("segment '{segment}' has no kind")));
    }

    let id = match &rest[..1] {
        ":" => {
            let name = percent_decode(&rest[1..])?;
            if name.is_empty() {
                return Err(Error::InvalidKey(format!("segment '{segment}' has empty name")));
            }
            KeyId::Name(name)
        }
        _ => KeyId::Id(Uuid::parse_str(&rest[1..])?),
    };

    Ok(Key {
        kind,
        id,
        parent: None,
    })
}

fn percent_decode(raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| Error::InvalidKey(format!("bad escape in '{raw}': {e}")))
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}
