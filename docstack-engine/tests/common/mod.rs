//! Shared test helpers for engine tests.

#![allow(dead_code)]

use docstack_engine::{Context, Engine, EngineConfig};
use docstack_model::strategy::SlugName;
use docstack_model::{Entity, Field, Role, Scope};
use docstack_storage::{KvStore, MemoryStore};
use docstack_types::{Key, Map, Value};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Routes engine logs to the test output; filter with `RUST_LOG`.
pub fn setup_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

pub fn input(json: serde_json::Value) -> Map {
    Value::map_from_json(json).expect("test input must be a JSON object")
}

pub fn admin_key() -> Key {
    Key::named("member", "root")
}

pub fn admin() -> Context {
    Context::new(admin_key(), Role::Admin)
}

pub fn caller(name: &str, role: Role) -> Context {
    Context::new(Key::named("member", name), role)
}

/// `post` with a single required `title`.
pub fn post_entity() -> Entity {
    Entity::compile("post", vec![Field::text("title").required()]).unwrap()
}

/// `post` whose key is derived from `title`.
pub fn named_post_entity() -> Entity {
    Entity::builder("post")
        .field(Field::text("title").required().name_provider())
        .field(Field::text("body"))
        .name_func(SlugName)
        .build()
        .unwrap()
}

/// A richer schema exercising nesting, multiplicity, hidden and
/// read-restricted fields. Guests may read, editors may write.
pub fn article_entity() -> Entity {
    Entity::builder("article")
        .rule(Scope::Read, Role::Guest)
        .rule(Scope::Write, Role::Editor)
        .field(Field::text("title").required())
        .field(Field::text("tags").multiple())
        .field(Field::text("author.name"))
        .field(Field::text("author.email").rule(Scope::Read, Role::Editor))
        .field(Field::text("secret").hidden())
        .build()
        .unwrap()
}

pub fn memory_engine() -> (Arc<MemoryStore>, Engine) {
    memory_engine_with(EngineConfig::default())
}

pub fn memory_engine_with(config: EngineConfig) -> (Arc<MemoryStore>, Engine) {
    setup_logging();
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(Arc::clone(&store) as Arc<dyn KvStore>, config);
    (store, engine)
}

/// Output field lookup by dotted path.
pub fn at<'a>(
    doc: &'a serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    segments.try_fold(doc.get(first)?, |node, seg| node.get(seg))
}
