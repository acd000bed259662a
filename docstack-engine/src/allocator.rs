use crate::{Context, EngineError, EngineResult};
use docstack_model::NameFunc;
use docstack_storage::Transaction;
use docstack_types::{Key, Value};
use tracing::debug;

/// Derives a free key of `kind` from the name-provider value.
///
/// Candidates come from `name_func` with attempts `0..max_retries`; each
/// one is probed through `tx`, so a record created concurrently under the
/// chosen name surfaces as a conflict at commit. A candidate equal to
/// `previous` is the record's own name and is accepted without a probe.
/// Never probes more than `max_retries` times.
pub fn allocate_key(
    tx: &mut dyn Transaction,
    ctx: &Context,
    kind: &str,
    name_func: &dyn NameFunc,
    provided: &Value,
    previous: &str,
    max_retries: u32,
) -> EngineResult<Key> {
    for attempt in 0..max_retries {
        let name = name_func.name(provided, previous, attempt);
        if name.is_empty() {
            return Err(EngineError::InvalidName {
                entity: kind.to_string(),
            });
        }

        let candidate = Key::named(kind, name);
        if !previous.is_empty() && candidate.name() == Some(previous) {
            return Ok(candidate);
        }

        ctx.check_cancelled()?;
        if tx.get(&candidate)?.is_none() {
            debug!(entity = %kind, attempt, "Allocated key");
            return Ok(candidate);
        }
        debug!(entity = %kind, attempt, "Key name taken, retrying");
    }

    Err(EngineError::NameAllocationExhausted {
        entity: kind.to_string(),
        attempts: max_retries,
    })
}
