//! Minimal in-crate credential store for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use moviestream_core::{TokenId, UserId};

use crate::password::hash_password;
use crate::store::{CredentialStore, Identity, RevocationRecord, StoreError, normalize_username};
use crate::Role;

#[derive(Debug, Default)]
pub(crate) struct StubStore {
    identities: Mutex<HashMap<String, Identity>>,
    revocations: Mutex<HashMap<TokenId, RevocationRecord>>,
    failing: AtomicBool,
    stalled: AtomicBool,
}

impl StubStore {
    /// Every call fails with `Unavailable` from now on.
    pub(crate) fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Every call hangs (until the caller's timeout fires) from now on.
    pub(crate) fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn revocation(&self, token_id: TokenId) -> Option<RevocationRecord> {
        self.revocations.lock().unwrap().get(&token_id).cloned()
    }

    pub(crate) fn revocation_count(&self) -> usize {
        self.revocations.lock().unwrap().len()
    }

    pub(crate) fn set_role(&self, email: &str, role: Role) {
        if let Some(identity) = self.identities.lock().unwrap().get_mut(email) {
            identity.role = role;
        }
    }

    async fn gate(&self) -> Result<(), StoreError> {
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("stub store is down"));
        }
        Ok(())
    }
}

pub(crate) fn identity(email: &str, password: &str, role: Role) -> Identity {
    Identity {
        user_id: UserId::new(),
        email: normalize_username(email),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        password_hash: hash_password(password).unwrap(),
        role,
        favourite_genres: vec!["Drama".to_string()],
        created_at: Utc::now(),
    }
}

#[async_trait]
impl CredentialStore for StubStore {
    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, StoreError> {
        self.gate().await?;
        Ok(self.identities.lock().unwrap().get(username).cloned())
    }

    async fn find_identity_by_id(&self, user_id: UserId) -> Result<Option<Identity>, StoreError> {
        self.gate().await?;
        Ok(self
            .identities
            .lock()
            .unwrap()
            .values()
            .find(|i| i.user_id == user_id)
            .cloned())
    }

    async fn insert_identity(&self, identity: Identity) -> Result<(), StoreError> {
        self.gate().await?;
        let mut map = self.identities.lock().unwrap();
        if map.contains_key(&identity.email) {
            return Err(StoreError::Conflict(identity.email));
        }
        map.insert(identity.email.clone(), identity);
        Ok(())
    }

    async fn insert_revocation(&self, record: RevocationRecord) -> Result<(), StoreError> {
        self.gate().await?;
        self.revocations
            .lock()
            .unwrap()
            .entry(record.token_id)
            .or_insert(record);
        Ok(())
    }

    async fn is_revoked(&self, token_id: TokenId) -> Result<bool, StoreError> {
        self.gate().await?;
        Ok(self.revocations.lock().unwrap().contains_key(&token_id))
    }

    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.gate().await?;
        let mut map = self.revocations.lock().unwrap();
        let before = map.len();
        map.retain(|_, r| r.expires_at > now);
        Ok((before - map.len()) as u64)
    }
}
