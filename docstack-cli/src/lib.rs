//! Config loading and command dispatch for the `docstack` binary.
//!
//! A `docstack.toml` file carries everything the engine needs at startup:
//!
//! ```toml
//! [engine]
//! max_name_retries = 5
//!
//! [ranks]
//! editor = 5
//!
//! [[entity]]
//! name = "post"
//! rules = { read = "guest", write = "editor" }
//!
//! [[entity.fields]]
//! name = "title"
//! required = true
//! ```

use anyhow::{Context as _, Result, anyhow, bail};
use clap::Subcommand;
use docstack_engine::{Context, Engine, EngineConfig};
use docstack_model::{Entity, EntityDefinition, RankTable, Role, SchemaFile, SchemaRegistry};
use docstack_storage::{KvStore, SqliteStore};
use docstack_types::Key;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Kind used for caller keys given by plain name.
pub const USER_KIND: &str = "user";

/// Contents of `docstack.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    /// Overrides on top of the default rank table.
    #[serde(default)]
    pub ranks: BTreeMap<Role, i32>,
    #[serde(rename = "entity", default)]
    pub entities: Vec<EntityDefinition>,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        debug!(path = %path.display(), entities = config.entities.len(), "Loaded config");
        Ok(config)
    }

    pub fn rank_table(&self) -> RankTable {
        self.ranks
            .iter()
            .fold(RankTable::default(), |table, (role, rank)| table.with(*role, *rank))
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a record from a JSON object
    Add { entity: String, json: String },
    /// Merge a JSON object into an existing record
    Update {
        entity: String,
        id: String,
        json: String,
    },
    /// Print a record
    Get { entity: String, id: String },
    /// Remove a record
    Delete { entity: String, id: String },
    /// Print the compiled schema
    Schema,
}

/// Who runs a command.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: Option<String>,
    pub role: Role,
}

impl Caller {
    /// Resolves `user` as an encoded key, or as a name under [`USER_KIND`].
    fn user_key(&self) -> Result<Option<Key>> {
        let Some(user) = self.user.as_deref() else {
            return Ok(None);
        };
        let key = if user.contains([':', '@']) {
            Key::decode(user).with_context(|| format!("invalid user key '{user}'"))?
        } else {
            Key::named(USER_KIND, user)
        };
        Ok(Some(key))
    }
}

/// Registry plus engine, built once per invocation.
pub struct App {
    registry: SchemaRegistry,
    engine: Engine,
    ranks: Arc<RankTable>,
}

impl App {
    /// Opens (creating if needed) the SQLite database at `db`.
    pub fn open(config: Config, db: &Path) -> Result<Self> {
        let store = SqliteStore::open(db)
            .with_context(|| format!("failed to open database {}", db.display()))?;
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: Config, store: Arc<dyn KvStore>) -> Result<Self> {
        let ranks = Arc::new(config.rank_table());
        let schema = SchemaFile {
            entities: config.entities,
        };
        let registry = SchemaRegistry::from_schema_file(&schema).context("invalid schema")?;
        info!(entities = registry.len(), "Schema compiled");
        Ok(Self {
            registry,
            engine: Engine::new(store, config.engine),
            ranks,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Runs `command` and returns the JSON to print.
    pub fn run(&self, command: Command, caller: &Caller) -> Result<serde_json::Value> {
        let ctx = self.context(caller)?;
        match command {
            Command::Add { entity, json } => {
                let entity = self.entity(&entity)?;
                let ctx = ctx.with_body(json);
                let input = ctx.parse_body()?;
                let holder = self.engine.add(&entity, ctx, input)?;
                Ok(holder.output().into())
            }
            Command::Update { entity, id, json } => {
                let entity = self.entity(&entity)?;
                let ctx = ctx.with_body(json);
                let input = ctx.parse_body()?;
                let holder = self.engine.update(&entity, ctx, &id, input)?;
                Ok(holder.output().into())
            }
            Command::Get { entity, id } => {
                let entity = self.entity(&entity)?;
                let holder = self.engine.get(&entity, ctx, &id)?;
                Ok(holder.output().into())
            }
            Command::Delete { entity, id } => {
                let entity = self.entity(&entity)?;
                self.engine.delete(&entity, ctx, &id)?;
                Ok(json!({ "deleted": id }))
            }
            Command::Schema => Ok(self.describe_schema()),
        }
    }

    fn context(&self, caller: &Caller) -> Result<Context> {
        let ctx = match caller.user_key()? {
            Some(user) => Context::new(user, caller.role),
            None if caller.role == Role::Guest => Context::anonymous(),
            None => bail!("role '{}' requires --user", caller.role),
        };
        Ok(ctx.with_ranks(Arc::clone(&self.ranks)))
    }

    fn entity(&self, name: &str) -> Result<Arc<Entity>> {
        self.registry
            .get(name)
            .ok_or_else(|| anyhow!("unknown entity '{name}'"))
    }

    fn describe_schema(&self) -> serde_json::Value {
        let entities: Vec<_> = self
            .registry
            .iter()
            .map(|entity| {
                let fields: Vec<_> = entity
                    .fields()
                    .iter()
                    .map(|field| {
                        json!({
                            "name": field.name(),
                            "type": field.field_type(),
                            "required": field.is_required(),
                            "multiple": field.is_multiple(),
                            "hidden": field.is_hidden(),
                            "name_provider": field.is_name_provider(),
                            "rules": field.rules(),
                        })
                    })
                    .collect();
                json!({
                    "name": entity.name(),
                    "rules": entity.rules(),
                    "fields": fields,
                })
            })
            .collect();
        json!({ "entities": entities })
    }
}
