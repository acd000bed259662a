use serde::{Deserialize, Serialize};

/// Default bound on naming-function attempts per write.
pub const DEFAULT_MAX_NAME_RETRIES: u32 = 5;

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum store probes while allocating a name-derived key.
    pub max_name_retries: u32,
    /// Keep the pre-update record under a child key on every update.
    pub archive_old_versions: bool,
    /// Write an `_audit` record in every add/update/delete transaction.
    pub audit_log: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_name_retries: DEFAULT_MAX_NAME_RETRIES,
            archive_old_versions: true,
            audit_log: true,
        }
    }
}
