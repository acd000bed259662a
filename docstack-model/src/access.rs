//! Role-ranked access model.
//!
//! A rule maps an operation [`Scope`] to the minimum [`Role`] allowed to
//! perform it. Callers are compared by rank through a [`RankTable`].
//!
//! Inheritance: a `write` rule seeds `add`, `edit` and `delete` unless
//! those are set explicitly. Entity-level rules additionally default every
//! unset operation scope to [`Role::Admin`], so an omitted rule never opens
//! access.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Caller role, ordered by privilege through a [`RankTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Subscriber,
    Editor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Subscriber => "subscriber",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Self::Guest),
            "subscriber" => Ok(Self::Subscriber),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Operation kind used to key access rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Read,
    /// Seed for `Add`, `Edit` and `Delete`; never an operation by itself.
    Write,
    Add,
    Edit,
    Delete,
}

impl Scope {
    /// Scopes an operation can actually run under.
    pub const OPERATIONS: [Scope; 4] = [Scope::Read, Scope::Add, Scope::Edit, Scope::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Add => "add",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-scope minimum roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rules(BTreeMap<Scope, Role>);

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, scope: Scope, role: Role) -> Self {
        self.0.insert(scope, role);
        self
    }

    pub fn set(&mut self, scope: Scope, role: Role) {
        self.0.insert(scope, role);
    }

    pub fn get(&self, scope: Scope) -> Option<Role> {
        self.0.get(&scope).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Scope, Role)> + '_ {
        self.0.iter().map(|(s, r)| (*s, *r))
    }

    /// Copies the `write` rule into any unset `add`/`edit`/`delete` rule.
    pub(crate) fn inherit_write(&mut self) {
        if let Some(write) = self.get(Scope::Write) {
            for scope in [Scope::Add, Scope::Edit, Scope::Delete] {
                self.0.entry(scope).or_insert(write);
            }
        }
    }

    /// Sets every still-unset operation scope to `role`.
    pub(crate) fn fill_missing(&mut self, role: Role) {
        for scope in Scope::OPERATIONS {
            self.0.entry(scope).or_insert(role);
        }
    }
}

impl From<BTreeMap<Scope, Role>> for Rules {
    fn from(map: BTreeMap<Scope, Role>) -> Self {
        Self(map)
    }
}

/// Numeric ordering of roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankTable(BTreeMap<Role, i32>);

impl RankTable {
    /// Rank of `role`. Roles missing from the table rank below every guest.
    pub fn rank(&self, role: Role) -> i32 {
        self.0.get(&role).copied().unwrap_or(i32::MIN)
    }

    #[must_use]
    pub fn with(mut self, role: Role, rank: i32) -> Self {
        self.0.insert(role, rank);
        self
    }

    /// True when `caller` ranks at least as high as `required`.
    pub fn permits(&self, caller: Role, required: Role) -> bool {
        self.rank(caller) >= self.rank(required)
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Role::Guest, 0),
            (Role::Subscriber, 1),
            (Role::Editor, 2),
            (Role::Admin, 3),
        ]))
    }
}
