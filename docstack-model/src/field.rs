//! Field definitions and the per-field validation pipeline.

use crate::strategy::{Defaulter, Transformer, Validator};
use crate::{FieldError, RequestContext, Role, Rules, Scope};
use chrono::{DateTime, Utc};
use docstack_types::{Key, Property, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The data type of a field.
///
/// Every type has an intrinsic acceptance check applied to non-null input
/// before any validator runs. `Timestamp` and `Key` additionally
/// canonicalize their string input into typed values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    LongText,
    Html,
    Slug,
    Url,
    Language,
    Number,
    Decimal,
    Boolean,
    Timestamp,
    Key,
    GeoPoint,
    Json,
}

impl FieldType {
    /// Whether a non-null value has the right shape for this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Text | Self::LongText | Self::Html | Self::Slug | Self::Url | Self::Language => {
                matches!(value, Value::String(_))
            }
            Self::Number => matches!(value, Value::Int(_)),
            Self::Decimal => matches!(value, Value::Int(_) | Value::Float(_)),
            Self::Boolean => matches!(value, Value::Bool(_)),
            Self::Timestamp => matches!(value, Value::String(_) | Value::Timestamp(_)),
            Self::Key => matches!(value, Value::String(_) | Value::Key(_)),
            Self::GeoPoint => value.as_map().is_some_and(|m| {
                m.get("lat").and_then(Value::as_f64).is_some()
                    && m.get("lng").and_then(Value::as_f64).is_some()
            }),
            Self::Json => true,
        }
    }

    /// Converts accepted input into its stored form.
    fn canonicalize(&self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (Self::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(&s)
                .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|_| "not an RFC 3339 timestamp".to_string()),
            (Self::Key, Value::String(s)) => Key::decode(&s)
                .map(Value::Key)
                .map_err(|_| "not a valid key".to_string()),
            (_, value) => Ok(value),
        }
    }
}

/// One schema attribute.
///
/// Built with the chained setters below, then handed to an
/// [`EntityBuilder`](crate::EntityBuilder), which validates the name,
/// compiles the pattern and resolves rule inheritance. After that the
/// field is immutable.
#[derive(Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) field_type: FieldType,
    pub(crate) required: bool,
    pub(crate) multiple: bool,
    pub(crate) no_index: bool,
    pub(crate) hidden: bool,
    pub(crate) name_provider: bool,
    pub(crate) rules: Rules,
    pub(crate) validate: Option<String>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) validator: Option<Arc<dyn Validator>>,
    pub(crate) transformer: Option<Arc<dyn Transformer>>,
    pub(crate) defaulter: Option<Arc<dyn Defaulter>>,
    pub(crate) is_nesting: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            multiple: false,
            no_index: false,
            hidden: false,
            name_provider: false,
            rules: Rules::new(),
            validate: None,
            pattern: None,
            validator: None,
            transformer: None,
            defaulter: None,
            is_nesting: false,
        }
    }

    /// Shorthand for a text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    #[must_use]
    pub fn no_index(mut self) -> Self {
        self.no_index = true;
        self
    }

    /// Stored but never returned by output.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Marks this field as the source of the record's key name.
    #[must_use]
    pub fn name_provider(mut self) -> Self {
        self.name_provider = true;
        self
    }

    #[must_use]
    pub fn rule(mut self, scope: Scope, role: Role) -> Self {
        self.rules.set(scope, role);
        self
    }

    /// Regex every string value must match. Takes precedence over
    /// [`Field::validator`]; non-string values are a type mismatch.
    #[must_use]
    pub fn validate(mut self, pattern: impl Into<String>) -> Self {
        self.validate = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn transform(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }

    #[must_use]
    pub fn default_with(mut self, defaulter: impl Defaulter + 'static) -> Self {
        self.defaulter = Some(Arc::new(defaulter));
        self
    }

    /// Default to a constant value.
    #[must_use]
    pub fn default_value(self, value: impl Into<Value>) -> Self {
        self.default_with(crate::strategy::Constant(value.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn is_no_index(&self) -> bool {
        self.no_index
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_name_provider(&self) -> bool {
        self.name_provider
    }

    /// True when the name is a dotted nesting path.
    pub fn is_nesting(&self) -> bool {
        self.is_nesting
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Path segments of the (possibly dotted) name.
    pub fn path(&self) -> impl Iterator<Item = &str> {
        self.name.split('.')
    }

    /// Checks the caller against this field's rule for `scope`, if any.
    /// Fields without a rule for the scope defer to the entity's rules.
    pub fn check_access(&self, ctx: &dyn RequestContext, scope: Scope) -> Result<(), FieldError> {
        match self.rules.get(scope) {
            Some(required) if !ctx.satisfies(required) => Err(FieldError::Forbidden {
                field: self.name.clone(),
                scope,
            }),
            _ => Ok(()),
        }
    }

    /// Runs the full pipeline for one raw input value under the caller's
    /// current scope, producing one property per accepted value.
    pub fn parse(&self, ctx: &dyn RequestContext, raw: &Value) -> Result<Vec<Property>, FieldError> {
        self.check_access(ctx, ctx.current_scope())?;

        if !self.multiple {
            return Ok(vec![self.property(self.parse_single_value(raw)?)]);
        }

        match raw {
            Value::Sequence(items) => items
                .iter()
                .map(|item| self.parse_single_value(item).map(|v| self.property(v)))
                .collect(),
            Value::Null => Ok(vec![self.property(self.parse_single_value(raw)?)]),
            other => Err(self.type_mismatch(other)),
        }
    }

    /// Checks and transforms one value: required-ness, type, validation,
    /// canonicalization, then the field's transformer.
    pub fn parse_single_value(&self, value: &Value) -> Result<Value, FieldError> {
        if value.is_null() {
            if self.required {
                return Err(FieldError::Required {
                    field: self.name.clone(),
                });
            }
            return Ok(Value::Null);
        }

        if !self.field_type.accepts(value) {
            return Err(self.type_mismatch(value));
        }

        if let Some(pattern) = &self.pattern {
            match value.as_str() {
                Some(s) if pattern.is_match(s) => {}
                Some(_) => return Err(self.invalid("does not match the required pattern")),
                None => return Err(self.type_mismatch(value)),
            }
        } else if let Some(validator) = &self.validator {
            if !validator.validate(value) {
                return Err(self.invalid("rejected by validator"));
            }
        }

        let value = self
            .field_type
            .canonicalize(value.clone())
            .map_err(|reason| self.invalid(reason))?;

        match &self.transformer {
            Some(transformer) => transformer
                .transform(value)
                .map_err(|reason| self.invalid(reason)),
            None => Ok(value),
        }
    }

    /// Default value for this field, if it declares one.
    pub fn default_for(&self, ctx: &dyn RequestContext) -> Option<Vec<Property>> {
        let value = self.defaulter.as_ref()?.default_value(ctx)?;
        let values = match value {
            Value::Sequence(items) if self.multiple => items,
            other => vec![other],
        };
        Some(values.into_iter().map(|v| self.property(v)).collect())
    }

    /// Wraps a value as a property of this field.
    pub fn property(&self, value: Value) -> Property {
        Property {
            name: self.name.clone(),
            value,
            multiple: self.multiple,
            no_index: self.no_index,
        }
    }

    fn type_mismatch(&self, value: &Value) -> FieldError {
        FieldError::TypeMismatch {
            field: self.name.clone(),
            found: value.type_name().to_string(),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> FieldError {
        FieldError::Invalid {
            field: self.name.clone(),
            reason: reason.into(),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("multiple", &self.multiple)
            .field("no_index", &self.no_index)
            .field("hidden", &self.hidden)
            .field("name_provider", &self.name_provider)
            .field("rules", &self.rules)
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}
