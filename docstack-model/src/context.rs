use crate::{RankTable, Role, Scope};
use docstack_types::Key;

/// What the schema layer needs to know about the caller of one request.
///
/// Implemented by the engine's per-request context; field pipelines,
/// defaulters and hooks only ever see this view.
pub trait RequestContext {
    /// Key of the authenticated user, if any.
    fn current_user_key(&self) -> Option<&Key>;

    fn role(&self) -> Role;

    /// The operation scope the request runs under.
    fn current_scope(&self) -> Scope;

    /// Rank table used to compare the caller against rules.
    fn ranks(&self) -> &RankTable;

    /// Raw request body bytes.
    fn body(&self) -> &[u8];

    fn rank(&self) -> i32 {
        self.ranks().rank(self.role())
    }

    fn is_authenticated(&self) -> bool {
        self.current_user_key().is_some()
    }

    /// True when the caller ranks at least as high as `required`.
    fn satisfies(&self, required: Role) -> bool {
        self.rank() >= self.ranks().rank(required)
    }
}
