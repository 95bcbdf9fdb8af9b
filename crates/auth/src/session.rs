//! Session lifecycle: login, refresh and logout.
//!
//! There is no session object. A session is whatever state the issued tokens
//! and the revocation set imply.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::claims::{TokenError, TokenKind};
use crate::password::verify_password_or_dummy;
use crate::store::{self, CredentialStore, Identity, RevocationRecord, StoreError, normalize_username};
use crate::token::{IssuedToken, TokenConfig, TokenIssuer, TokenVerifier};

/// What happens to a refresh token when it is used.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// The refresh token stays valid until it expires or is logged out.
    #[default]
    Reuse,
    /// Each refresh revokes the presented token and hands out a new one.
    Rotate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub refresh_policy: RefreshPolicy,
    /// Upper bound for every credential store call.
    pub store_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_policy: RefreshPolicy::Reuse,
            store_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: Identity,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access: IssuedToken,
    /// Replacement refresh token; only under [`RefreshPolicy::Rotate`].
    pub refresh: Option<IssuedToken>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("user not found")]
    UserNotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    /// The refresh token cannot be used. Which check failed is deliberately
    /// not reported.
    #[error("refresh token rejected")]
    RefreshRejected,

    #[error("token signing failed: {0}")]
    Signing(String),

    /// The password check did not run to completion.
    #[error("password verification failed: {0}")]
    Hashing(String),

    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
}

impl SessionError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::StoreUnavailable(_))
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::StoreUnavailable(err.to_string())
    }
}

fn issue_error(err: TokenError) -> SessionError {
    SessionError::Signing(err.to_string())
}

/// Collapse verifier failures for refresh/logout. Store trouble stays visible
/// as a retryable error; everything else becomes `RefreshRejected`.
fn refresh_error(err: TokenError) -> SessionError {
    match err {
        TokenError::StoreUnavailable(msg) => SessionError::StoreUnavailable(msg),
        other => {
            debug!(reason = %other, "refresh token rejected");
            SessionError::RefreshRejected
        }
    }
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        issuer: TokenIssuer,
        verifier: TokenVerifier,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            issuer,
            verifier,
            config,
        }
    }

    /// Build the issuer and verifier from one token config and share `store`
    /// between them.
    pub fn from_config(
        tokens: &TokenConfig,
        config: SessionConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let issuer = TokenIssuer::new(tokens);
        let verifier = TokenVerifier::new(tokens, store.clone(), config.store_timeout);
        Self::new(store, issuer, verifier, config)
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[instrument(skip_all)]
    pub async fn login(
        &self,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, SessionError> {
        let username = normalize_username(&credentials.username);

        let identity = store::bounded(
            self.config.store_timeout,
            self.store.find_identity_by_username(&username),
        )
        .await?;

        // Unknown users still pay for one Argon2 verification.
        let password = credentials.password.clone();
        let hash = identity.as_ref().map(|i| i.password_hash.clone());
        let matches = tokio::task::spawn_blocking(move || {
            verify_password_or_dummy(&password, hash.as_deref())
        })
        .await
        .map_err(|e| SessionError::Hashing(e.to_string()))?;

        let Some(identity) = identity else {
            return Err(SessionError::UserNotFound);
        };
        if !matches {
            warn!(user_id = %identity.user_id, "login rejected: password mismatch");
            return Err(SessionError::InvalidCredentials);
        }

        let access = self
            .issuer
            .issue_access(identity.user_id, identity.role, now)
            .map_err(issue_error)?;
        let refresh = self
            .issuer
            .issue_refresh(identity.user_id, identity.role, now)
            .map_err(issue_error)?;

        info!(user_id = %identity.user_id, role = %identity.role, "login succeeded");
        Ok(LoginOutcome {
            identity,
            access,
            refresh,
        })
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The role is re-read from the store so role changes apply on the next
    /// refresh.
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, SessionError> {
        let claims = self
            .verifier
            .verify(refresh_token, TokenKind::Refresh, now)
            .await
            .map_err(refresh_error)?;

        let identity = store::bounded(
            self.config.store_timeout,
            self.store.find_identity_by_id(claims.user_id),
        )
        .await?
        .ok_or_else(|| {
            warn!(user_id = %claims.user_id, "refresh for unknown identity");
            SessionError::RefreshRejected
        })?;

        let access = self
            .issuer
            .issue_access(identity.user_id, identity.role, now)
            .map_err(issue_error)?;

        let refresh = match self.config.refresh_policy {
            RefreshPolicy::Reuse => None,
            RefreshPolicy::Rotate => {
                let replacement = self
                    .issuer
                    .issue_refresh(identity.user_id, identity.role, now)
                    .map_err(issue_error)?;
                if let Some(token_id) = claims.token_id {
                    self.revoke(RevocationRecord {
                        token_id,
                        revoked_at: now,
                        expires_at: claims.expires_at,
                    })
                    .await?;
                }
                Some(replacement)
            }
        };

        debug!(user_id = %identity.user_id, rotated = refresh.is_some(), "access token refreshed");
        Ok(RefreshOutcome { access, refresh })
    }

    /// Revoke a refresh token.
    ///
    /// Idempotent: an already revoked token succeeds without touching the
    /// store, and an expired one succeeds without being recorded since it can
    /// no longer mint access tokens.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<(), SessionError> {
        let claims = match self
            .verifier
            .verify(refresh_token, TokenKind::Refresh, now)
            .await
        {
            Ok(claims) => claims,
            Err(TokenError::Revoked) | Err(TokenError::Expired) => return Ok(()),
            Err(e) => return Err(refresh_error(e)),
        };

        let Some(token_id) = claims.token_id else {
            return Err(SessionError::RefreshRejected);
        };

        self.revoke(RevocationRecord {
            token_id,
            revoked_at: now,
            expires_at: claims.expires_at,
        })
        .await?;

        info!(user_id = %claims.user_id, %token_id, "refresh token revoked");
        Ok(())
    }

    async fn revoke(&self, record: RevocationRecord) -> Result<(), SessionError> {
        store::bounded(self.config.store_timeout, self.store.insert_revocation(record))
            .await
            .map_err(SessionError::from)
    }
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("issuer", &self.issuer)
            .field("verifier", &self.verifier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubStore, identity};
    use crate::Role;
    use chrono::Duration as ChronoDuration;

    const SECRET: &str = "session-test-secret-session-test";
    const PASSWORD: &str = "hunter2hunter2";

    async fn setup(policy: RefreshPolicy) -> (SessionManager, Arc<StubStore>) {
        let store = Arc::new(StubStore::default());
        store
            .insert_identity(identity("alice@example.com", PASSWORD, Role::User))
            .await
            .unwrap();

        let tokens = TokenConfig::new(SECRET).unwrap();
        let config = SessionConfig {
            refresh_policy: policy,
            store_timeout: Duration::from_millis(100),
        };
        (SessionManager::from_config(&tokens, config, store.clone()), store)
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn login_issues_verifiable_access_token() {
        let (sessions, _) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();

        let out = sessions.login(&creds("Alice@Example.com", PASSWORD), now).await.unwrap();
        let claims = sessions
            .verifier()
            .verify(&out.access.token, TokenKind::Access, now)
            .await
            .unwrap();

        assert_eq!(claims.user_id, out.identity.user_id);
        assert_eq!(claims.role, Some(Role::User));
        assert!(out.refresh.token_id.is_some());
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_are_distinct_internally() {
        let (sessions, _) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();

        let err = sessions.login(&creds("bob@example.com", PASSWORD), now).await.unwrap_err();
        assert_eq!(err, SessionError::UserNotFound);

        let err = sessions.login(&creds("alice@example.com", "nope"), now).await.unwrap_err();
        assert_eq!(err, SessionError::InvalidCredentials);
    }

    #[tokio::test]
    async fn unknown_user_still_pays_for_a_password_check() {
        let (sessions, _) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();

        // Warm up so neither timing includes first-use overhead.
        let _ = sessions.login(&creds("alice@example.com", "nope"), now).await;

        let started = std::time::Instant::now();
        let _ = sessions.login(&creds("alice@example.com", "nope"), now).await;
        let wrong_password = started.elapsed();

        let started = std::time::Instant::now();
        let err = sessions.login(&creds("bob@example.com", "nope"), now).await.unwrap_err();
        let unknown_user = started.elapsed();

        assert_eq!(err, SessionError::UserNotFound);
        assert!(
            unknown_user * 4 >= wrong_password,
            "unknown user took {unknown_user:?}, wrong password took {wrong_password:?}"
        );
    }

    #[tokio::test]
    async fn refresh_mints_new_access_token() {
        let (sessions, _) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();
        let login = sessions.login(&creds("alice@example.com", PASSWORD), now).await.unwrap();

        let later = now + ChronoDuration::minutes(20);
        let out = sessions.refresh(&login.refresh.token, later).await.unwrap();

        assert!(out.refresh.is_none());
        let claims = sessions
            .verifier()
            .verify(&out.access.token, TokenKind::Access, later)
            .await
            .unwrap();
        assert_eq!(claims.user_id, login.identity.user_id);
    }

    #[tokio::test]
    async fn refresh_picks_up_role_changes() {
        let (sessions, store) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();
        let login = sessions.login(&creds("alice@example.com", PASSWORD), now).await.unwrap();

        store.set_role("alice@example.com", Role::Admin);
        let out = sessions.refresh(&login.refresh.token, now).await.unwrap();
        let claims = sessions
            .verifier()
            .verify_stateless(&out.access.token, TokenKind::Access, now)
            .unwrap();
        assert_eq!(claims.role, Some(Role::Admin));
    }

    #[tokio::test]
    async fn refresh_after_logout_is_rejected() {
        let (sessions, _) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();
        let login = sessions.login(&creds("alice@example.com", PASSWORD), now).await.unwrap();

        sessions.logout(&login.refresh.token, now).await.unwrap();
        let err = sessions.refresh(&login.refresh.token, now).await.unwrap_err();
        assert_eq!(err, SessionError::RefreshRejected);
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (sessions, store) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();
        let login = sessions.login(&creds("alice@example.com", PASSWORD), now).await.unwrap();
        let token_id = login.refresh.token_id.unwrap();

        sessions.logout(&login.refresh.token, now).await.unwrap();
        let first = store.revocation(token_id).unwrap();

        let later = now + ChronoDuration::minutes(1);
        sessions.logout(&login.refresh.token, later).await.unwrap();

        assert_eq!(store.revocation_count(), 1);
        assert_eq!(store.revocation(token_id).unwrap(), first);
    }

    #[tokio::test]
    async fn logout_of_expired_token_records_nothing() {
        let (sessions, store) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();
        let login = sessions.login(&creds("alice@example.com", PASSWORD), now).await.unwrap();

        let after_expiry = login.refresh.expires_at + ChronoDuration::seconds(1);
        sessions.logout(&login.refresh.token, after_expiry).await.unwrap();
        assert_eq!(store.revocation_count(), 0);
    }

    #[tokio::test]
    async fn access_token_cannot_be_used_to_refresh_or_logout() {
        let (sessions, _) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();
        let login = sessions.login(&creds("alice@example.com", PASSWORD), now).await.unwrap();

        assert_eq!(
            sessions.refresh(&login.access.token, now).await.unwrap_err(),
            SessionError::RefreshRejected
        );
        assert_eq!(
            sessions.logout(&login.access.token, now).await.unwrap_err(),
            SessionError::RefreshRejected
        );
    }

    #[tokio::test]
    async fn rotation_revokes_the_presented_token() {
        let (sessions, _) = setup(RefreshPolicy::Rotate).await;
        let now = Utc::now();
        let login = sessions.login(&creds("alice@example.com", PASSWORD), now).await.unwrap();

        let out = sessions.refresh(&login.refresh.token, now).await.unwrap();
        let replacement = out.refresh.expect("rotation hands out a new refresh token");
        assert_ne!(replacement.token_id, login.refresh.token_id);

        assert_eq!(
            sessions.refresh(&login.refresh.token, now).await.unwrap_err(),
            SessionError::RefreshRejected
        );
        assert!(sessions.refresh(&replacement.token, now).await.is_ok());
    }

    #[tokio::test]
    async fn store_outage_is_retryable_not_a_rejection() {
        let (sessions, store) = setup(RefreshPolicy::Reuse).await;
        let now = Utc::now();
        let login = sessions.login(&creds("alice@example.com", PASSWORD), now).await.unwrap();

        store.fail();
        let err = sessions.refresh(&login.refresh.token, now).await.unwrap_err();
        assert!(matches!(err, SessionError::StoreUnavailable(_)));
        assert!(err.is_retryable());

        let err = sessions.login(&creds("alice@example.com", PASSWORD), now).await.unwrap_err();
        assert!(matches!(err, SessionError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn stalled_store_times_out() {
        let (sessions, store) = setup(RefreshPolicy::Reuse).await;
        store.stall();

        let err = sessions
            .login(&creds("alice@example.com", PASSWORD), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::StoreUnavailable(_)));
    }
}
