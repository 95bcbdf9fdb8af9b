//! Credential store contract.
//!
//! The auth core never talks to a database directly; identity lookups and the
//! refresh-token revocation set go through [`CredentialStore`]. Implementations
//! live in `moviestream-infra`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use moviestream_core::{TokenId, UserId};

use crate::Role;

/// A registered user as persisted by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    /// Login name. Always stored normalized (see [`normalize_username`]).
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub role: Role,
    pub favourite_genres: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A revoked refresh token.
///
/// `expires_at` is the token's own expiry; once it has passed the record is
/// no longer needed and may be purged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub token_id: TokenId,
    pub revoked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Persistence contract consumed by the session lifecycle.
///
/// Implementations must be safe to share across request tasks and must not
/// hold locks across `.await` points.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an identity by its (normalized) login name.
    async fn find_identity_by_username(&self, username: &str)
    -> Result<Option<Identity>, StoreError>;

    async fn find_identity_by_id(&self, user_id: UserId) -> Result<Option<Identity>, StoreError>;

    /// Persist a new identity. Fails with [`StoreError::Conflict`] when the
    /// login name is already taken.
    async fn insert_identity(&self, identity: Identity) -> Result<(), StoreError>;

    /// Record a revocation. Inserting an already-present token id is a no-op
    /// that keeps the original record.
    async fn insert_revocation(&self, record: RevocationRecord) -> Result<(), StoreError>;

    async fn is_revoked(&self, token_id: TokenId) -> Result<bool, StoreError>;

    /// Drop revocation records whose token has naturally expired by `now`.
    /// Returns how many records were removed.
    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Liveness probe for health checks.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Canonical form of a login name.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Run a store call with an upper bound on how long it may take.
///
/// On timeout the inner future is dropped, which abandons the call.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
