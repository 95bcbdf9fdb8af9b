use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{Principal, Role, TokenKind, TokenVerifier};

/// Authentication failed. The cause is intentionally not carried.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unauthenticated")]
pub struct AuthnError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: requires role '{required}'")]
    Forbidden { required: Role },
}

/// Coarse gate: turn a bearer access token into a [`Principal`].
///
/// Expired, forged, malformed and wrong-kind tokens all yield the same
/// [`AuthnError`].
pub fn authenticate(
    verifier: &TokenVerifier,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Principal, AuthnError> {
    let claims = verifier
        .verify_stateless(token, TokenKind::Access, now)
        .map_err(|e| {
            debug!(reason = %e, "access token rejected");
            AuthnError
        })?;
    Principal::from_claims(&claims).ok_or(AuthnError)
}

/// Fine-grained gate, layered on top of [`authenticate`].
///
/// - No IO
/// - No panics
pub fn require_role(principal: &Principal, required: Role) -> Result<(), AuthzError> {
    if principal.role.satisfies(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { required })
    }
}
