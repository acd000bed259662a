//! Compiled entity schemas.

use crate::strategy::NameFunc;
use crate::{
    EntityHooks, Field, NoHooks, RequestContext, Role, Rules, SchemaError, SchemaResult, Scope,
};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const RESERVED_ENTITY_NAMES: [&str; 2] = ["user", "project"];
const RESERVED_FIELD_NAMES: [&str; 2] = ["id", "meta"];

/// A compiled schema: an ordered set of fields plus entity-level rules,
/// hooks and the naming strategy.
///
/// Built once at startup through [`Entity::builder`] or [`Entity::compile`]
/// and read-only afterwards.
pub struct Entity {
    name: String,
    fields: Vec<Field>,
    fields_by_name: HashMap<String, usize>,
    required_fields: Vec<usize>,
    rules: Rules,
    name_provider: Option<usize>,
    name_func: Option<Arc<dyn NameFunc>>,
    hooks: Arc<dyn EntityHooks>,
}

impl Entity {
    pub fn builder(name: impl Into<String>) -> EntityBuilder {
        EntityBuilder {
            name: name.into(),
            fields: Vec::new(),
            rules: Rules::new(),
            name_func: None,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Compiles `fields` with default rules and no hooks.
    pub fn compile(name: impl Into<String>, fields: Vec<Field>) -> SchemaResult<Self> {
        Self::builder(name).fields(fields).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields_by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &Field> {
        self.required_fields.iter().map(|&i| &self.fields[i])
    }

    /// Effective entity-level rules; every operation scope is set.
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn name_provider(&self) -> Option<&Field> {
        self.name_provider.map(|i| &self.fields[i])
    }

    pub fn name_func(&self) -> Option<&dyn NameFunc> {
        self.name_func.as_deref()
    }

    pub fn hooks(&self) -> &dyn EntityHooks {
        self.hooks.as_ref()
    }

    /// Whether the caller may perform `scope` on this entity at all.
    pub fn permits(&self, ctx: &dyn RequestContext, scope: Scope) -> bool {
        let required = self.rules.get(scope).unwrap_or(Role::Admin);
        ctx.satisfies(required)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("rules", &self.rules)
            .field("name_provider", &self.name_provider().map(Field::name))
            .field("has_name_func", &self.name_func.is_some())
            .finish_non_exhaustive()
    }
}

/// Collects fields, rules and strategies, then validates them in
/// [`EntityBuilder::build`].
pub struct EntityBuilder {
    name: String,
    fields: Vec<Field>,
    rules: Rules,
    name_func: Option<Arc<dyn NameFunc>>,
    hooks: Arc<dyn EntityHooks>,
}

impl EntityBuilder {
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    #[must_use]
    pub fn rule(mut self, scope: Scope, role: Role) -> Self {
        self.rules.set(scope, role);
        self
    }

    #[must_use]
    pub fn rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn name_func(mut self, name_func: impl NameFunc + 'static) -> Self {
        self.name_func = Some(Arc::new(name_func));
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: impl EntityHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Validates the schema and derives the lookup indexes.
    pub fn build(self) -> SchemaResult<Entity> {
        validate_entity_name(&self.name)?;

        let mut fields = self.fields;
        let mut fields_by_name = HashMap::with_capacity(fields.len());
        let mut required_fields = Vec::new();
        let mut name_provider: Option<(usize, String)> = None;

        for (index, field) in fields.iter_mut().enumerate() {
            validate_field_name(&field.name)?;
            if fields_by_name.insert(field.name.clone(), index).is_some() {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }

            field.is_nesting = field.name.contains('.');
            field.rules.inherit_write();

            if let Some(pattern) = &field.validate {
                let compiled = Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
                    field: field.name.clone(),
                    source,
                })?;
                field.pattern = Some(compiled);
            }

            if field.required {
                required_fields.push(index);
            }

            if field.name_provider {
                if let Some((_, first)) = name_provider {
                    return Err(SchemaError::MultipleNameProviders {
                        first,
                        second: field.name.clone(),
                    });
                }
                name_provider = Some((index, field.name.clone()));
            }
        }

        let mut rules = self.rules;
        rules.inherit_write();
        rules.fill_missing(Role::Admin);

        tracing::debug!(
            entity = %self.name,
            fields = fields.len(),
            required = required_fields.len(),
            "Compiled entity schema"
        );

        Ok(Entity {
            name: self.name,
            fields,
            fields_by_name,
            required_fields,
            rules,
            name_provider: name_provider.map(|(index, _)| index),
            name_func: self.name_func,
            hooks: self.hooks,
        })
    }
}

fn validate_entity_name(name: &str) -> SchemaResult<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(SchemaError::InvalidEntityName(name.to_string()));
    }
    if RESERVED_ENTITY_NAMES.contains(&name) {
        return Err(SchemaError::ReservedEntityName(name.to_string()));
    }
    Ok(())
}

fn validate_field_name(name: &str) -> SchemaResult<()> {
    if name.is_empty() {
        return Err(SchemaError::EmptyFieldName);
    }
    let root = name.split('.').next().unwrap_or(name);
    if RESERVED_FIELD_NAMES.contains(&root) {
        return Err(SchemaError::ReservedFieldName(name.to_string()));
    }
    if name.starts_with('_') {
        return Err(SchemaError::UnderscoreFieldName(name.to_string()));
    }
    Ok(())
}
