//! Schema-driven document engine.
//!
//! Turns semi-structured input into validated, versioned records:
//!
//! ```text
//! Entity (compiled once)
//!    │  new_holder(ctx)
//!    ▼
//! DataHolder ── prepare(input) ── load(stored) ── save() ──► Vec<Property>
//!                                                              │
//! Engine::add / update / delete ── one store transaction ◄─────┘
//!    (record + archived previous version + audit entry)
//! ```
//!
//! The engine is synchronous and keeps no state between requests; the
//! store is the only shared mutable resource. Updates rely on the store's
//! conflict detection and surface a retryable [`EngineError::Conflict`]
//! instead of retrying internally.

mod allocator;
mod config;
mod context;
mod error;
mod holder;
mod output;
mod writer;

pub use allocator::allocate_key;
pub use config::{DEFAULT_MAX_NAME_RETRIES, EngineConfig};
pub use context::{CancellationToken, Context};
pub use error::{EngineError, EngineResult};
pub use holder::DataHolder;
pub use writer::{AUDIT_KIND, Engine};

use docstack_model::Entity;

/// Per-request entry point on a compiled [`Entity`].
pub trait EntityExt {
    /// A fresh holder bound to this entity and `ctx`.
    fn new_holder(&self, ctx: Context) -> DataHolder<'_>;
}

impl EntityExt for Entity {
    fn new_holder(&self, ctx: Context) -> DataHolder<'_> {
        DataHolder::new(self, ctx)
    }
}
