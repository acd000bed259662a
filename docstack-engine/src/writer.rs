//! Transactional writer.
//!
//! Every mutating operation runs as one store transaction covering the
//! primary record, the archived previous version and the audit entry.
//! Cancellation is checked before each store call and once more before
//! commit; a cancelled or failed operation leaves the store untouched.

use crate::allocator::allocate_key;
use crate::{Context, DataHolder, EngineConfig, EngineError, EngineResult};
use chrono::Utc;
use docstack_model::{Entity, RequestContext, Scope};
use docstack_storage::{KvStore, Transaction, run_in_transaction};
use docstack_types::{Key, Map, Property, Value, meta};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Kind of the audit records written alongside every mutation.
pub const AUDIT_KIND: &str = "_audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Update,
    Delete,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Runs Add/Update/Get/Delete for compiled entities against a store.
pub struct Engine {
    store: Arc<dyn KvStore>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(store: Arc<dyn KvStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates `input` and stores it as a new record.
    pub fn add<'e>(
        &self,
        entity: &'e Entity,
        ctx: Context,
        input: Map,
    ) -> EngineResult<DataHolder<'e>> {
        let mut holder = self.authorize(entity, ctx, Scope::Add)?;
        holder.prepare(input)?;

        let key = run_in_transaction(self.store.as_ref(), |tx| {
            holder.context().check_cancelled()?;
            let properties = finalize(&mut holder)?;

            let key = match (entity.name_func(), holder.name_provider_value()) {
                (Some(name_func), Some(provided)) => allocate_key(
                    tx,
                    holder.context(),
                    entity.name(),
                    name_func,
                    provided,
                    "",
                    self.config.max_name_retries,
                )?,
                _ => self.store.new_incomplete_key(entity.name()),
            };

            holder.context().check_cancelled()?;
            let key = tx.put(&key, &properties)?;
            self.audit(tx, holder.context(), Action::Add, &key, &properties)?;
            holder.context().check_cancelled()?;
            Ok::<_, EngineError>(key)
        })
        .inspect_err(|e| log_rejected(entity, Action::Add, e))?;

        info!(entity = %entity.name(), key = %key, "Added record");
        entity
            .hooks()
            .after_write(holder.context(), &key, holder.saved());
        holder.set_key(key);
        Ok(holder)
    }

    /// Applies `input` over the stored record `id`.
    ///
    /// Fields absent from `input` keep their stored values. The previous
    /// record is archived and `meta.version` advances by one. If the
    /// name-provider value yields a different name, the record moves to
    /// the new key and the old key is deleted in the same transaction.
    /// Archived versions can't be updated.
    pub fn update<'e>(
        &self,
        entity: &'e Entity,
        ctx: Context,
        id: &str,
        input: Map,
    ) -> EngineResult<DataHolder<'e>> {
        let mut holder = self.authorize(entity, ctx, Scope::Edit)?;
        let key = self.resolve_live_key(entity, id)?;
        holder.prepare(input)?;

        let (committed, archived) = run_in_transaction(self.store.as_ref(), |tx| {
            holder.context().check_cancelled()?;
            let stored = tx
                .get(&key)?
                .ok_or_else(|| EngineError::NotFound(key.encode()))?;
            holder.load(stored)?;
            let properties = finalize(&mut holder)?;

            let target = match (entity.name_func(), holder.name_provider_value()) {
                (Some(name_func), Some(provided)) => allocate_key(
                    tx,
                    holder.context(),
                    entity.name(),
                    name_func,
                    provided,
                    key.name().unwrap_or_default(),
                    self.config.max_name_retries,
                )?,
                _ => key.clone(),
            };

            holder.context().check_cancelled()?;
            let committed = tx.put(&target, &properties)?;
            if committed != key {
                holder.context().check_cancelled()?;
                tx.delete(&key)?;
                debug!(entity = %entity.name(), "Record renamed, old key deleted");
            }

            let archived = if self.config.archive_old_versions {
                let archive_key = self
                    .store
                    .new_incomplete_key(entity.name())
                    .with_parent(committed.clone());
                match holder.old_version(archive_key) {
                    Some(old) => {
                        holder.context().check_cancelled()?;
                        let archived = tx.put(old.key().unwrap_or(&committed), old.saved())?;
                        Some(archived)
                    }
                    None => None,
                }
            } else {
                None
            };

            self.audit(tx, holder.context(), Action::Update, &committed, &properties)?;
            holder.context().check_cancelled()?;
            Ok::<_, EngineError>((committed, archived))
        })
        .inspect_err(|e| log_rejected(entity, Action::Update, e))?;

        info!(
            entity = %entity.name(),
            key = %committed,
            version = version_of(holder.saved()),
            archived = archived.is_some(),
            "Updated record"
        );
        entity
            .hooks()
            .after_write(holder.context(), &committed, holder.saved());
        holder.set_key(committed);
        Ok(holder)
    }

    /// Loads record `id` for output. `id` may name an archived version.
    pub fn get<'e>(&self, entity: &'e Entity, ctx: Context, id: &str) -> EngineResult<DataHolder<'e>> {
        let mut holder = self.authorize(entity, ctx, Scope::Read)?;
        let key = self.resolve_key(entity, id)?;

        holder.context().check_cancelled()?;
        let stored = self.store.get(&key)?;
        holder.load(stored)?;
        holder.set_key(key);
        Ok(holder)
    }

    /// Removes record `id`.
    ///
    /// Fields with a `delete` rule the caller doesn't satisfy block the
    /// removal when the record holds a value for them. Archived versions
    /// can't be deleted.
    pub fn delete(&self, entity: &Entity, ctx: Context, id: &str) -> EngineResult<()> {
        let holder = self.authorize(entity, ctx, Scope::Delete)?;
        let key = self.resolve_live_key(entity, id)?;
        let ctx = holder.context();

        run_in_transaction(self.store.as_ref(), |tx| {
            ctx.check_cancelled()?;
            let stored = tx
                .get(&key)?
                .ok_or_else(|| EngineError::NotFound(key.encode()))?;

            for prop in &stored {
                if let Some(field) = entity.field(&prop.name) {
                    field.check_access(ctx, Scope::Delete)?;
                }
            }

            ctx.check_cancelled()?;
            tx.delete(&key)?;
            self.audit(tx, ctx, Action::Delete, &key, &stored)?;
            ctx.check_cancelled()?;
            Ok::<_, EngineError>(())
        })
        .inspect_err(|e| log_rejected(entity, Action::Delete, e))?;

        info!(entity = %entity.name(), key = %key, "Deleted record");
        Ok(())
    }

    /// Binds `ctx` to `scope` and checks the entity-level rule.
    fn authorize<'e>(
        &self,
        entity: &'e Entity,
        ctx: Context,
        scope: Scope,
    ) -> EngineResult<DataHolder<'e>> {
        let mut holder = DataHolder::new(entity, ctx);
        holder.context_mut().set_scope(scope);
        if !entity.permits(holder.context(), scope) {
            warn!(entity = %entity.name(), scope = %scope, role = %holder.context().role(), "Entity access denied");
            return Err(EngineError::Forbidden {
                entity: entity.name().to_string(),
                scope,
            });
        }
        Ok(holder)
    }

    /// Like [`resolve_key`](Self::resolve_key) but refuses archived
    /// versions, which live under a parent key and are read-only.
    fn resolve_live_key(&self, entity: &Entity, id: &str) -> EngineResult<Key> {
        let key = self.resolve_key(entity, id)?;
        if key.parent().is_some() {
            return Err(EngineError::InvalidKey(format!(
                "'{}' is an archived version and can't be modified",
                key.encode()
            )));
        }
        Ok(key)
    }

    fn resolve_key(&self, entity: &Entity, id: &str) -> EngineResult<Key> {
        let key = self.store.decode_key(id)?;
        if key.kind() != entity.name() {
            return Err(EngineError::InvalidKey(format!(
                "key of kind '{}' does not belong to '{}'",
                key.kind(),
                entity.name()
            )));
        }
        Ok(key)
    }

    fn audit(
        &self,
        tx: &mut dyn Transaction,
        ctx: &Context,
        action: Action,
        target: &Key,
        properties: &[Property],
    ) -> EngineResult<()> {
        if !self.config.audit_log {
            return Ok(());
        }
        let user = ctx
            .current_user_key()
            .cloned()
            .map_or(Value::Null, Value::Key);
        let record = vec![
            Property::new("action", action.as_str()),
            Property::new("target", target.encode()),
            Property::new("user", user),
            Property::new("at", Utc::now()),
            Property::new("version", version_of(properties)),
        ];

        ctx.check_cancelled()?;
        tx.put(&self.store.new_incomplete_key(AUDIT_KIND), &record)?;
        Ok(())
    }
}

/// Saves the holder and lets `before_write` edit the result.
fn finalize(holder: &mut DataHolder<'_>) -> EngineResult<Vec<Property>> {
    let mut properties = holder.save()?;
    holder
        .entity()
        .hooks()
        .before_write(holder.context(), &mut properties)
        .map_err(EngineError::Hook)?;
    holder.set_saved(properties.clone());
    Ok(properties)
}

fn version_of(properties: &[Property]) -> i64 {
    properties
        .iter()
        .find(|p| p.name == meta::VERSION)
        .and_then(|p| p.value.as_i64())
        .unwrap_or(0)
}

fn log_rejected(entity: &Entity, action: Action, err: &EngineError) {
    if err.is_retryable() {
        warn!(entity = %entity.name(), action = action.as_str(), error = %err, "Write conflict");
    } else {
        debug!(entity = %entity.name(), action = action.as_str(), error = %err, "Write rejected");
    }
}
