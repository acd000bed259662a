//! Serializable schema definitions.
//!
//! Closures can't be written to a config file, so definitions name the
//! built-in strategies instead. [`EntityDefinition::compile`] resolves them
//! and hands the result to the same [`EntityBuilder`](crate::EntityBuilder)
//! code-defined schemas use.
//!
//! ```toml
//! [[entity]]
//! name = "post"
//! rules = { read = "guest", write = "editor" }
//!
//! [[entity.fields]]
//! name = "title"
//! required = true
//! name_provider = true
//!
//! [[entity.fields]]
//! name = "author"
//! type = "key"
//! default_from = "current_user"
//! ```

use crate::strategy::{CurrentUser, Lowercase, Now, SlugName, Slugify, Trim};
use crate::{Entity, Field, FieldType, Rules, SchemaError, SchemaResult};
use docstack_types::Value;
use serde::{Deserialize, Serialize};

/// Root of a schema file: a list of `[[entity]]` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(rename = "entity", default)]
    pub entities: Vec<EntityDefinition>,
}

impl SchemaFile {
    pub fn from_toml_str(s: &str) -> SchemaResult<Self> {
        Ok(toml::from_str(s)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Rules::is_empty")]
    pub rules: Rules,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl EntityDefinition {
    /// Builds the entity. A name-provider field gets [`SlugName`] keys.
    pub fn compile(&self) -> SchemaResult<Entity> {
        let fields = self
            .fields
            .iter()
            .map(FieldDefinition::to_field)
            .collect::<SchemaResult<Vec<_>>>()?;

        let mut builder = Entity::builder(&self.name)
            .rules(self.rules.clone())
            .fields(fields);
        if self.fields.iter().any(|f| f.name_provider) {
            builder = builder.name_func(SlugName);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub no_index: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub name_provider: bool,
    #[serde(default, skip_serializing_if = "Rules::is_empty")]
    pub rules: Rules,
    /// Regex pattern for string values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformKind>,
    /// Constant default, in JSON form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_from: Option<DefaultKind>,
}

impl FieldDefinition {
    pub fn to_field(&self) -> SchemaResult<Field> {
        let mut field = Field::new(&self.name, self.field_type);
        field.required = self.required;
        field.multiple = self.multiple;
        field.no_index = self.no_index;
        field.hidden = self.hidden;
        field.name_provider = self.name_provider;
        field.rules = self.rules.clone();
        field.validate = self.validate.clone();

        field = match self.transform {
            Some(TransformKind::Slugify) => field.transform(Slugify),
            Some(TransformKind::Trim) => field.transform(Trim),
            Some(TransformKind::Lowercase) => field.transform(Lowercase),
            None => field,
        };

        match (&self.default, self.default_from) {
            (Some(_), Some(_)) => Err(self.invalid_default("both `default` and `default_from` are set")),
            (Some(json), None) => {
                let value = Value::from_json(json.clone());
                self.check_default(&value)?;
                Ok(field.default_value(value))
            }
            (None, Some(DefaultKind::CurrentUser)) => Ok(field.default_with(CurrentUser)),
            (None, Some(DefaultKind::Now)) => Ok(field.default_with(Now)),
            (None, None) => Ok(field),
        }
    }

    fn check_default(&self, value: &Value) -> SchemaResult<()> {
        let ok = match value {
            Value::Sequence(items) if self.multiple => {
                items.iter().all(|v| self.field_type.accepts(v))
            }
            Value::Null => !self.required,
            other => self.field_type.accepts(other),
        };
        if ok {
            Ok(())
        } else {
            Err(self.invalid_default(format!(
                "a {} value does not fit a {:?} field",
                value.type_name(),
                self.field_type
            )))
        }
    }

    fn invalid_default(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidDefault {
            field: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Built-in transformers selectable from a schema file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Slugify,
    Trim,
    Lowercase,
}

/// Built-in computed defaults selectable from a schema file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultKind {
    CurrentUser,
    Now,
}
