//! Account registration.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use moviestream_core::{DomainError, UserId};

use crate::password::hash_password;
use crate::store::{self, CredentialStore, Identity, StoreError, normalize_username};
use crate::Role;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Sign-up data as submitted by a client.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub favourite_genres: Vec<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("{0}")]
    Invalid(#[from] DomainError),

    #[error("email already registered")]
    AlreadyRegistered,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
}

impl Registration {
    fn validate(&self) -> Result<(), DomainError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(DomainError::validation("first and last name are required"));
        }
        Ok(())
    }
}

/// Creates identities in the credential store.
#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn CredentialStore>,
    store_timeout: Duration,
}

impl Registrar {
    pub fn new(store: Arc<dyn CredentialStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Validate, hash and persist a new identity with the given role.
    pub async fn register(
        &self,
        registration: Registration,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Identity, RegistrationError> {
        registration.validate()?;

        let password = registration.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| RegistrationError::Hashing(e.to_string()))?
            .map_err(|e| RegistrationError::Hashing(e.to_string()))?;

        let identity = Identity {
            user_id: UserId::new(),
            email: normalize_username(&registration.email),
            first_name: registration.first_name.trim().to_string(),
            last_name: registration.last_name.trim().to_string(),
            password_hash,
            role,
            favourite_genres: registration
                .favourite_genres
                .into_iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
            created_at: now,
        };

        store::bounded(self.store_timeout, self.store.insert_identity(identity.clone()))
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => RegistrationError::AlreadyRegistered,
                other => RegistrationError::StoreUnavailable(other.to_string()),
            })?;

        info!(user_id = %identity.user_id, role = %identity.role, "identity registered");
        Ok(identity)
    }
}
