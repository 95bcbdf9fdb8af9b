use serde::{Deserialize, Serialize};

use moviestream_core::UserId;

use crate::{Role, TokenKind, VerifiedClaims};

/// An authenticated caller: who they are and what role they act with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Build a principal from verified access-token claims.
    ///
    /// Returns `None` for refresh claims, which carry no role.
    pub fn from_claims(claims: &VerifiedClaims) -> Option<Self> {
        if claims.kind != TokenKind::Access {
            return None;
        }
        claims.role.map(|role| Self::new(claims.user_id, role))
    }
}
