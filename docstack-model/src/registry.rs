use crate::{Entity, SchemaError, SchemaFile, SchemaResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Compiled entities by name.
///
/// Built once at startup and then shared read-only (usually behind an
/// `Arc`) with every request handler.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, Arc<Entity>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and registers every definition in `file`.
    pub fn from_schema_file(file: &SchemaFile) -> SchemaResult<Self> {
        let mut registry = Self::new();
        for definition in &file.entities {
            registry.register(definition.compile()?)?;
        }
        Ok(registry)
    }

    /// Adds a compiled entity. Names must be unique.
    pub fn register(&mut self, entity: Entity) -> SchemaResult<Arc<Entity>> {
        let name = entity.name().to_string();
        if self.entities.contains_key(&name) {
            return Err(SchemaError::DuplicateEntity(name));
        }
        let entity = Arc::new(entity);
        self.entities.insert(name.clone(), Arc::clone(&entity));
        info!(entity = %name, fields = entity.fields().len(), "Registered entity");
        Ok(entity)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Entity>> {
        self.entities.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
