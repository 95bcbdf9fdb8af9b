use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use moviestream_auth::{CredentialStore, Identity, RevocationRecord, StoreError};
use moviestream_core::{TokenId, UserId};

/// In-memory credential store for tests/dev.
///
/// Locks are held only for the duration of one map operation.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    identities: RwLock<HashMap<String, Identity>>,
    revocations: RwLock<HashMap<TokenId, RevocationRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revocation_count(&self) -> usize {
        self.revocations.read().map(|m| m.len()).unwrap_or(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::unavailable("in-memory store lock poisoned")
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, StoreError> {
        let map = self.identities.read().map_err(|_| poisoned())?;
        Ok(map.get(username).cloned())
    }

    async fn find_identity_by_id(&self, user_id: UserId) -> Result<Option<Identity>, StoreError> {
        let map = self.identities.read().map_err(|_| poisoned())?;
        Ok(map.values().find(|i| i.user_id == user_id).cloned())
    }

    async fn insert_identity(&self, identity: Identity) -> Result<(), StoreError> {
        let mut map = self.identities.write().map_err(|_| poisoned())?;
        if map.contains_key(&identity.email) {
            return Err(StoreError::Conflict(identity.email));
        }
        map.insert(identity.email.clone(), identity);
        Ok(())
    }

    async fn insert_revocation(&self, record: RevocationRecord) -> Result<(), StoreError> {
        let mut map = self.revocations.write().map_err(|_| poisoned())?;
        map.entry(record.token_id).or_insert(record);
        Ok(())
    }

    async fn is_revoked(&self, token_id: TokenId) -> Result<bool, StoreError> {
        let map = self.revocations.read().map_err(|_| poisoned())?;
        Ok(map.contains_key(&token_id))
    }

    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut map = self.revocations.write().map_err(|_| poisoned())?;
        let before = map.len();
        map.retain(|_, r| r.expires_at > now);
        Ok((before - map.len()) as u64)
    }
}
