use crate::RequestContext;
use docstack_types::{Key, Map, Property};

/// Optional lifecycle hooks for an entity.
///
/// Most entities do NOT need these. The field pipeline and the writer
/// handle validation, merging and metadata on their own.
///
/// Implement only if you need:
/// - Input normalization before field parsing (`pre_init`)
/// - Cross-field checks on the final property list (`before_write`)
/// - Derived output fields (`after_read`)
/// - Side effects once a write is committed (`after_write`)
pub trait EntityHooks: Send + Sync {
    /// Called with the raw input map before any field is parsed.
    /// Return `Err(message)` to reject the request.
    fn pre_init(&self, ctx: &dyn RequestContext, input: &mut Map) -> Result<(), String> {
        let _ = (ctx, input);
        Ok(())
    }

    /// Called inside the write transaction with the exact property list
    /// about to be stored. Return `Err(message)` to abort the write.
    fn before_write(
        &self,
        ctx: &dyn RequestContext,
        properties: &mut Vec<Property>,
    ) -> Result<(), String> {
        let _ = (ctx, properties);
        Ok(())
    }

    /// Called on every output document before it is returned.
    fn after_read(
        &self,
        ctx: &dyn RequestContext,
        output: &mut serde_json::Map<String, serde_json::Value>,
    ) {
        let _ = (ctx, output);
    }

    /// Called after the write transaction committed.
    fn after_write(&self, ctx: &dyn RequestContext, key: &Key, properties: &[Property]) {
        let _ = (ctx, key, properties);
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl EntityHooks for NoHooks {}
