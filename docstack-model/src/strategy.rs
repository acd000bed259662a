//! Per-field strategy objects.
//!
//! A field's behavior beyond its static attributes is expressed through
//! four small traits, each with a blanket implementation for plain
//! closures so tests and one-off schemas can stay terse:
//!
//! - [`Validator`]: accepts or rejects the original input value
//! - [`Transformer`]: canonicalizes an accepted value for storage
//! - [`Defaulter`]: produces a value when neither input nor storage has one
//! - [`NameFunc`]: derives a storage key name from the name-provider value

use crate::RequestContext;
use chrono::Utc;
use docstack_types::Value;

/// Accepts or rejects a single, non-null input value.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value) -> bool;
}

impl<F> Validator for F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn validate(&self, value: &Value) -> bool {
        self(value)
    }
}

/// Canonicalizes an accepted value. `Err` carries a reason that may be
/// shown to the caller, so it must not echo the value.
pub trait Transformer: Send + Sync {
    fn transform(&self, value: Value) -> Result<Value, String>;
}

impl<F> Transformer for F
where
    F: Fn(Value) -> Result<Value, String> + Send + Sync,
{
    fn transform(&self, value: Value) -> Result<Value, String> {
        self(value)
    }
}

/// Produces a value for a field that has neither input nor stored data.
pub trait Defaulter: Send + Sync {
    fn default_value(&self, ctx: &dyn RequestContext) -> Option<Value>;
}

impl<F> Defaulter for F
where
    F: Fn(&dyn RequestContext) -> Option<Value> + Send + Sync,
{
    fn default_value(&self, ctx: &dyn RequestContext) -> Option<Value> {
        self(ctx)
    }
}

/// Derives a key name from the name-provider value.
///
/// `previous` is empty on create and the current key name on update;
/// `attempt` starts at 0 and grows by one after every collision.
pub trait NameFunc: Send + Sync {
    fn name(&self, provided: &Value, previous: &str, attempt: u32) -> String;
}

impl<F> NameFunc for F
where
    F: Fn(&Value, &str, u32) -> String + Send + Sync,
{
    fn name(&self, provided: &Value, previous: &str, attempt: u32) -> String {
        self(provided, previous, attempt)
    }
}

// ── Built-in validators ──────────────────────────────────────────

/// Accepts strings made of word characters and dashes that start and end
/// with an ASCII alphanumeric.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsSlug;

impl Validator for IsSlug {
    fn validate(&self, value: &Value) -> bool {
        value.as_str().is_some_and(is_slug)
    }
}

pub fn is_slug(s: &str) -> bool {
    let (Some(first), Some(last)) = (s.chars().next(), s.chars().last()) else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ── Built-in transformers ────────────────────────────────────────

/// Turns text into a lower-case, dash-separated ASCII slug.
#[derive(Debug, Clone, Copy, Default)]
pub struct Slugify;

impl Transformer for Slugify {
    fn transform(&self, value: Value) -> Result<Value, String> {
        match value {
            Value::String(s) => {
                let slug = slugify(&s);
                if slug.is_empty() {
                    Err("slug would be empty".to_string())
                } else {
                    Ok(Value::String(slug))
                }
            }
            other => Err(format!("cannot slugify a {}", other.type_name())),
        }
    }
}

/// Lower-cases ASCII alphanumerics and collapses every other run of
/// characters into a single `-`. Leading and trailing separators are dropped.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Strips surrounding whitespace from strings; other values pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trim;

impl Transformer for Trim {
    fn transform(&self, value: Value) -> Result<Value, String> {
        Ok(match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        })
    }
}

/// Lower-cases strings; other values pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lowercase;

impl Transformer for Lowercase {
    fn transform(&self, value: Value) -> Result<Value, String> {
        Ok(match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        })
    }
}

// ── Built-in defaulters ──────────────────────────────────────────

/// Always yields the same value.
#[derive(Debug, Clone)]
pub struct Constant(pub Value);

impl Defaulter for Constant {
    fn default_value(&self, _ctx: &dyn RequestContext) -> Option<Value> {
        Some(self.0.clone())
    }
}

/// Yields the caller's key; nothing for anonymous callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentUser;

impl Defaulter for CurrentUser {
    fn default_value(&self, ctx: &dyn RequestContext) -> Option<Value> {
        ctx.current_user_key().cloned().map(Value::Key)
    }
}

/// Yields the current time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Now;

impl Defaulter for Now {
    fn default_value(&self, _ctx: &dyn RequestContext) -> Option<Value> {
        Some(Value::Timestamp(Utc::now()))
    }
}

// ── Built-in name functions ──────────────────────────────────────

/// Slug of the provided string; attempt `n > 0` appends `-n`.
/// Non-string values yield an empty (rejected) name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlugName;

impl NameFunc for SlugName {
    fn name(&self, provided: &Value, _previous: &str, attempt: u32) -> String {
        let base = provided.as_str().map(slugify).unwrap_or_default();
        if base.is_empty() || attempt == 0 {
            base
        } else {
            format!("{base}-{attempt}")
        }
    }
}
