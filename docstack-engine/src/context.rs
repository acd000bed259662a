//! Per-request caller context.

use crate::{EngineError, EngineResult};
use docstack_model::{RankTable, RequestContext, Role, Scope};
use docstack_types::{Key, Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Who is calling, with which role, under which scope, and until when.
///
/// A context belongs to exactly one request. The engine sets the scope
/// for each operation; everything else is fixed by the caller.
#[derive(Debug, Clone)]
pub struct Context {
    user: Option<Key>,
    role: Role,
    scope: Scope,
    ranks: Arc<RankTable>,
    body: Vec<u8>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// An authenticated caller.
    pub fn new(user: Key, role: Role) -> Self {
        Self {
            user: Some(user),
            ..Self::anonymous()
        }
        .with_role(role)
    }

    /// An unauthenticated guest.
    pub fn anonymous() -> Self {
        Self {
            user: None,
            role: Role::Guest,
            scope: Scope::Read,
            ranks: Arc::new(RankTable::default()),
            body: Vec::new(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Scope for holders used directly. [`Engine`](crate::Engine)
    /// operations override it with their own.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_ranks(mut self, ranks: Arc<RankTable>) -> Self {
        self.ranks = ranks;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn user(&self) -> Option<&Key> {
        self.user.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    /// Fails with [`EngineError::Cancelled`] once the token fired or the
    /// deadline passed.
    pub fn check_cancelled(&self) -> EngineResult<()> {
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        if expired || self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// Parses the raw body as a JSON object.
    pub fn parse_body(&self) -> EngineResult<Map> {
        if self.body.is_empty() {
            return Ok(Map::new());
        }
        let json: serde_json::Value = serde_json::from_slice(&self.body)
            .map_err(|e| EngineError::InvalidInput(format!("body is not JSON: {e}")))?;
        Value::map_from_json(json)
            .ok_or_else(|| EngineError::InvalidInput("body must be a JSON object".into()))
    }
}

impl RequestContext for Context {
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
        &self.body
    }
}
