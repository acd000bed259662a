//! Shared test helpers for model tests.

#![allow(dead_code)]

use docstack_model::{RankTable, RequestContext, Role, Scope};
use docstack_types::Key;

/// Minimal request context with a fixed role and scope.
pub struct TestCtx {
    pub user: Option<Key>,
    pub role: Role,
    pub scope: Scope,
    pub ranks: RankTable,
}

impl TestCtx {
    pub fn new(role: Role, scope: Scope) -> Self {
        Self {
            user: Some(Key::named("member", "tester")),
            role,
            scope,
            ranks: RankTable::default(),
        }
    }

    pub fn admin() -> Self {
        Self::new(Role::Admin, Scope::Add)
    }

    pub fn anonymous(scope: Scope) -> Self {
        Self {
            user: None,
            ..Self::new(Role::Guest, scope)
        }
    }
}

impl RequestContext for TestCtx {
    fn current_user_key(&self) -> Option<&Key> {
        self.user.as_ref()
    }

    fn role(&self) -> Role {
        self.role
    }

    fn current_scope(&self) -> Scope {
        self.scope
    }

    fn ranks(&self) -> &RankTable {
        &self.ranks
    }

    fn body(&self) -> &[u8] {
        &[]
    }
}
