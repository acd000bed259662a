//! Per-request working set: input → validated properties → merged record.
//!
//! A [`DataHolder`] is created for one request, bound to one compiled
//! [`Entity`] and one [`Context`]. It moves through three steps:
//!
//! 1. [`prepare`](DataHolder::prepare) runs every field present in the
//!    input through its pipeline. Fields missing from the input are left
//!    *waiting*: whether that is an error is only decided at save time.
//! 2. [`load`](DataHolder::load) (updates only) brings in the stored
//!    record so waiting fields can carry their old values forward.
//! 3. [`save`](DataHolder::save) merges input over stored data, applies
//!    defaults, enforces required fields and stamps metadata.
//!
//! Each step either succeeds completely or leaves the holder unchanged.

use crate::output;
use crate::{Context, EngineError, EngineResult};
use chrono::Utc;
use docstack_model::{Entity, Field, FieldError, RequestContext, Scope};
use docstack_types::{Key, Map, Property, Status, Value, meta};
use std::collections::HashMap;

pub struct DataHolder<'e> {
    entity: &'e Entity,
    ctx: Context,
    key: Option<Key>,
    /// Parsed input, indexed like `entity.fields()`.
    prepared: HashMap<usize, Vec<Property>>,
    /// Field indexes absent from the input.
    waiting: Vec<usize>,
    /// Stored record as loaded, in stored order.
    stored: Option<Vec<Property>>,
    /// Stored properties grouped by name.
    loaded: HashMap<String, Vec<Property>>,
    saved: Vec<Property>,
    name_provider_value: Option<Value>,
    is_old_version: bool,
}

impl<'e> DataHolder<'e> {
    pub fn new(entity: &'e Entity, ctx: Context) -> Self {
        Self {
            entity,
            ctx,
            key: None,
            prepared: HashMap::new(),
            waiting: Vec::new(),
            stored: None,
            loaded: HashMap::new(),
            saved: Vec::new(),
            name_provider_value: None,
            is_old_version: false,
        }
    }

    pub fn entity(&self) -> &'e Entity {
        self.entity
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub(crate) fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// Key of the record, once resolved or allocated.
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub(crate) fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    /// Raw input value of the name-provider field, if it was supplied.
    pub fn name_provider_value(&self) -> Option<&Value> {
        self.name_provider_value.as_ref()
    }

    /// Names of fields that were not in the input.
    pub fn waiting(&self) -> impl Iterator<Item = &str> {
        self.waiting.iter().map(|&i| self.entity.fields()[i].name())
    }

    /// The property list produced by the last successful [`save`](Self::save).
    pub fn saved(&self) -> &[Property] {
        &self.saved
    }

    /// The stored record handed to [`load`](Self::load), if any.
    pub fn stored(&self) -> Option<&[Property]> {
        self.stored.as_deref()
    }

    /// True for holders describing an archived, superseded record.
    pub fn is_old_version(&self) -> bool {
        self.is_old_version
    }

    /// Parses `input` field by field.
    ///
    /// A field is looked up under its full name first, then by walking
    /// nested maps along its dotted path. Missing intermediate maps simply
    /// mean the field is absent.
    ///
    /// Input is always checked against write rules: a context not already
    /// bound to `add` or `edit` is bound to `edit` once a record was loaded
    /// and to `add` otherwise.
    pub fn prepare(&mut self, mut input: Map) -> EngineResult<()> {
        let scope = self.write_scope();
        self.ctx.set_scope(scope);

        self.entity
            .hooks()
            .pre_init(&self.ctx, &mut input)
            .map_err(EngineError::Hook)?;

        let mut prepared = HashMap::new();
        let mut waiting = Vec::new();
        let mut name_provider_value = None;

        for (index, field) in self.entity.fields().iter().enumerate() {
            let Some(raw) = lookup(&input, field) else {
                waiting.push(index);
                continue;
            };
            let properties = field.parse(&self.ctx, raw)?;
            if field.is_name_provider() && !raw.is_null() {
                name_provider_value = Some(raw.clone());
            }
            prepared.insert(index, properties);
        }

        self.prepared = prepared;
        self.waiting = waiting;
        self.name_provider_value = name_provider_value;
        Ok(())
    }

    fn write_scope(&self) -> Scope {
        match self.ctx.current_scope() {
            scope @ (Scope::Add | Scope::Edit) => scope,
            _ if self.stored.is_some() => Scope::Edit,
            _ => Scope::Add,
        }
    }

    /// Merges the currently stored record of the target key.
    pub fn load(&mut self, existing: Vec<Property>) -> EngineResult<()> {
        let mut loaded: HashMap<String, Vec<Property>> = HashMap::new();
        for prop in &existing {
            loaded.entry(prop.name.clone()).or_default().push(prop.clone());
        }
        self.loaded = loaded;
        self.stored = Some(existing);
        Ok(())
    }

    /// Assembles the final property list and stamps metadata.
    ///
    /// Per field, in declared order: explicit input wins, then stored
    /// data, then the field's default. A required field left without any
    /// value fails the whole save. Stored properties that match no field
    /// are carried over unchanged.
    pub fn save(&mut self) -> EngineResult<Vec<Property>> {
        let mut properties = Vec::new();

        for (index, field) in self.entity.fields().iter().enumerate() {
            let values = if let Some(input) = self.prepared.get(&index) {
                input.clone()
            } else if let Some(stored) = self.loaded.get(field.name()) {
                stored.clone()
            } else {
                field.default_for(&self.ctx).unwrap_or_default()
            };

            if field.is_required() && values.iter().all(|p| p.value.is_null()) {
                return Err(required(field));
            }
            properties.extend(values);
        }

        if let Some(stored) = &self.stored {
            properties.extend(
                stored
                    .iter()
                    .filter(|p| !p.is_meta() && self.entity.field(&p.name).is_none())
                    .cloned(),
            );
        }

        self.stamp_meta(&mut properties);
        self.saved = properties.clone();
        Ok(properties)
    }

    /// Replaces the saved list after a `before_write` hook edited it.
    pub(crate) fn set_saved(&mut self, properties: Vec<Property>) {
        self.saved = properties;
    }

    fn stamp_meta(&self, properties: &mut Vec<Property>) {
        let now = Value::Timestamp(Utc::now());
        let user = self.ctx.current_user_key().cloned().map(Value::Key);

        properties.push(Property::new(meta::UPDATED_AT, now.clone()));
        properties.push(Property::new(meta::STATUS, Status::Active));

        if self.stored.is_some() {
            if let Some(created_at) = self.loaded_meta(meta::CREATED_AT) {
                properties.push(Property::new(meta::CREATED_AT, created_at.clone()));
            }
            if let Some(created_by) = self.loaded_meta(meta::CREATED_BY) {
                properties.push(Property::new(meta::CREATED_BY, created_by.clone()));
            }
            let previous = self
                .loaded_meta(meta::VERSION)
                .and_then(Value::as_i64)
                .unwrap_or(0);
            properties.push(Property::new(meta::VERSION, previous.saturating_add(1)));
        } else {
            properties.push(Property::new(meta::CREATED_AT, now));
            if let Some(user) = &user {
                properties.push(Property::new(meta::CREATED_BY, user.clone()));
            }
            properties.push(Property::new(meta::VERSION, 0i64));
        }

        if let Some(user) = user {
            properties.push(Property::new(meta::UPDATED_BY, user));
        }
    }

    fn loaded_meta(&self, name: &str) -> Option<&Value> {
        self.loaded
            .get(name)
            .and_then(|props| props.first())
            .map(|p| &p.value)
    }

    /// The JSON document the caller may see.
    ///
    /// Projects the saved list, or the stored record when nothing has been
    /// saved yet, then runs the entity's `after_read` hook.
    pub fn output(&self) -> serde_json::Map<String, serde_json::Value> {
        let source = if self.saved.is_empty() {
            self.stored.as_deref().unwrap_or_default()
        } else {
            &self.saved
        };
        let mut doc = output::project(self.entity, &self.ctx, self.key.as_ref(), source);
        self.entity.hooks().after_read(&self.ctx, &mut doc);
        doc
    }

    /// A holder for the archived copy of the stored record under `key`.
    /// `None` when nothing was loaded.
    pub(crate) fn old_version(&self, key: Key) -> Option<DataHolder<'e>> {
        let stored = self.stored.as_ref()?;
        let mut archived: Vec<Property> = stored
            .iter()
            .filter(|p| p.name != meta::STATUS)
            .cloned()
            .collect();
        archived.push(Property::new(meta::STATUS, Status::Archived));

        let mut holder = DataHolder::new(self.entity, self.ctx.clone());
        holder.key = Some(key);
        holder.stored = Some(stored.clone());
        holder.saved = archived;
        holder.is_old_version = true;
        Some(holder)
    }
}

fn lookup<'m>(input: &'m Map, field: &Field) -> Option<&'m Value> {
    if let Some(value) = input.get(field.name()) {
        return Some(value);
    }
    if !field.is_nesting() {
        return None;
    }

    let mut segments = field.path().peekable();
    let mut current = input;
    while let Some(segment) = segments.next() {
        let value = current.get(segment)?;
        if segments.peek().is_none() {
            return Some(value);
        }
        current = value.as_map()?;
    }
    None
}

fn required(field: &Field) -> EngineError {
    EngineError::Field(FieldError::Required {
        field: field.name().to_string(),
    })
}

impl std::fmt::Debug for DataHolder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataHolder")
            .field("entity", &self.entity.name())
            .field("key", &self.key)
            .field("prepared", &self.prepared.len())
            .field("waiting", &self.waiting().collect::<Vec<_>>())
            .field("loaded", &self.stored.is_some())
            .field("saved", &self.saved.len())
            .field("is_old_version", &self.is_old_version)
            .finish()
    }
}
