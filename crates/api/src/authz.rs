//! API-side role guard.
//!
//! Handlers call this before touching a store so a forbidden request never
//! causes side effects.

use moviestream_auth::{AuthzError, Role, require_role};

use crate::context::AuthContext;

/// Check that the caller holds at least `required`.
pub fn authorize_role(ctx: &AuthContext, required: Role) -> Result<(), AuthzError> {
    require_role(ctx.principal(), required)
}
