//! Token issuance and verification (HS256 JWTs).
//!
//! Both halves are plain values holding immutable keys; they are `Clone`,
//! `Send + Sync` and need no locking. The only I/O is the revocation lookup
//! done by [`TokenVerifier::verify`] for refresh tokens.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use moviestream_core::{TokenId, UserId};

use crate::claims::{TokenClaims, TokenError, TokenKind, VerifiedClaims, validate_claims};
use crate::store::{self, CredentialStore};
use crate::Role;

/// Signing key and lifetimes shared by the issuer and the verifier.
#[derive(Clone)]
pub struct TokenConfig {
    secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
    pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

    /// Create a config with default lifetimes. An empty key is rejected.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::Signing("signing key is empty".to_string()));
        }
        Ok(Self {
            secret,
            access_ttl: Duration::minutes(Self::DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl: Duration::days(Self::DEFAULT_REFRESH_TTL_DAYS),
        })
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// A freshly signed token plus the metadata callers usually need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub kind: TokenKind,
    /// Set for refresh tokens.
    pub token_id: Option<TokenId>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Seconds left until expiry, as seen from `now`.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    header: Header,
    encoding_key: EncodingKey,
    config: TokenConfig,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            header: Header::new(Algorithm::HS256),
            encoding_key: EncodingKey::from_secret(&config.secret),
            config: config.clone(),
        }
    }

    /// Sign a token of `kind` for `user_id`.
    ///
    /// The role is embedded in access tokens only; refresh tokens get a fresh
    /// `jti` instead.
    pub fn issue(
        &self,
        user_id: UserId,
        role: Role,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        if user_id.is_nil() {
            return Err(TokenError::EmptyIdentity);
        }

        let iat = now.timestamp();
        let exp = now
            .checked_add_signed(self.config.ttl(kind))
            .ok_or_else(|| TokenError::Signing(format!("{kind:?} token expiry out of range")))?
            .timestamp();

        let (role, jti) = match kind {
            TokenKind::Access => (Some(role), None),
            TokenKind::Refresh => (None, Some(TokenId::new())),
        };

        let claims = TokenClaims {
            sub: user_id,
            role,
            iat,
            exp,
            kind,
            jti,
        };

        let token = encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            kind,
            token_id: jti,
            issued_at: from_secs(iat)?,
            expires_at: from_secs(exp)?,
        })
    }

    pub fn issue_access(
        &self,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, role, TokenKind::Access, now)
    }

    pub fn issue_refresh(
        &self,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, role, TokenKind::Refresh, now)
    }
}

impl core::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    revocations: Arc<dyn CredentialStore>,
    store_timeout: StdDuration,
}

impl TokenVerifier {
    pub fn new(
        config: &TokenConfig,
        revocations: Arc<dyn CredentialStore>,
        store_timeout: StdDuration,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `validate_claims`,
        // after the kind check.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            revocations,
            store_timeout,
        }
    }

    /// Signature, kind and expiry checks. No I/O.
    ///
    /// Sufficient on its own for access tokens, which are never revocable.
    pub fn verify_stateless(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<VerifiedClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(map_jwt_error)?;
        validate_claims(&data.claims, kind, now)
    }

    /// Full verification: [`Self::verify_stateless`] plus, for refresh tokens,
    /// a revocation lookup bounded by the store timeout.
    pub async fn verify(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<VerifiedClaims, TokenError> {
        let claims = self.verify_stateless(token, kind, now)?;

        if let Some(token_id) = claims.token_id {
            let revoked = store::bounded(self.store_timeout, self.revocations.is_revoked(token_id))
                .await
                .map_err(|e| TokenError::StoreUnavailable(e.to_string()))?;
            if revoked {
                return Err(TokenError::Revoked);
            }
        }

        Ok(claims)
    }
}

impl core::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed(err.to_string()),
    }
}

fn from_secs(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| TokenError::Signing(format!("timestamp out of range: {secs}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubStore;
    use crate::RevocationRecord;
    use uuid::Uuid;

    const SECRET: &str = "unit-test-secret-unit-test-secret";

    fn setup() -> (TokenIssuer, TokenVerifier, Arc<StubStore>) {
        let config = TokenConfig::new(SECRET).unwrap();
        let store = Arc::new(StubStore::default());
        let verifier = TokenVerifier::new(&config, store.clone(), StdDuration::from_millis(100));
        (TokenIssuer::new(&config), verifier, store)
    }

    #[tokio::test]
    async fn access_token_round_trip() {
        let (issuer, verifier, _) = setup();
        let now = Utc::now();
        let user = UserId::new();

        let issued = issuer.issue_access(user, Role::Admin, now).unwrap();
        assert_eq!(issued.token.split('.').count(), 3);
        assert_eq!(issued.token_id, None);

        let claims = verifier.verify(&issued.token, TokenKind::Access, now).await.unwrap();
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.role, Some(Role::Admin));
        assert_eq!(claims.expires_at, issued.expires_at);
        assert_eq!(
            claims.expires_at.timestamp() - claims.issued_at.timestamp(),
            TokenConfig::DEFAULT_ACCESS_TTL_MINUTES * 60
        );
    }

    #[tokio::test]
    async fn refresh_token_carries_id_but_no_role() {
        let (issuer, verifier, _) = setup();
        let now = Utc::now();

        let issued = issuer.issue_refresh(UserId::new(), Role::User, now).unwrap();
        let claims = verifier.verify(&issued.token, TokenKind::Refresh, now).await.unwrap();

        assert!(claims.token_id.is_some());
        assert_eq!(claims.token_id, issued.token_id);
        assert_eq!(claims.role, None);
    }

    #[test]
    fn nil_identity_is_rejected() {
        let (issuer, _, _) = setup();
        let err = issuer
            .issue_access(UserId::from_uuid(Uuid::nil()), Role::User, Utc::now())
            .unwrap_err();
        assert_eq!(err, TokenError::EmptyIdentity);
    }

    #[test]
    fn empty_signing_key_is_rejected() {
        assert!(matches!(TokenConfig::new(""), Err(TokenError::Signing(_))));
    }

    #[test]
    fn issuer_follows_configured_lifetimes() {
        let config = TokenConfig::new(SECRET)
            .unwrap()
            .with_access_ttl(Duration::minutes(2))
            .with_refresh_ttl(Duration::days(30));
        let issuer = TokenIssuer::new(&config);
        let now = Utc::now();

        for kind in [TokenKind::Access, TokenKind::Refresh] {
            let issued = issuer.issue(UserId::new(), Role::User, kind, now).unwrap();
            assert_eq!(issued.expires_in(issued.issued_at), config.ttl(kind).num_seconds());
        }
    }

    #[test]
    fn lifetime_past_the_calendar_is_a_signing_error() {
        let config = TokenConfig::new(SECRET)
            .unwrap()
            .with_refresh_ttl(Duration::days(100_000_000));
        let issuer = TokenIssuer::new(&config);
        let now = Utc::now();

        assert!(matches!(
            issuer.issue_refresh(UserId::new(), Role::User, now),
            Err(TokenError::Signing(_))
        ));
        // The access lifetime is untouched and still issues.
        assert!(issuer.issue_access(UserId::new(), Role::User, now).is_ok());
    }

    #[test]
    fn foreign_key_fails_signature_check() {
        let (issuer, _, store) = setup();
        let other = TokenConfig::new("some-other-secret-some-other-secret").unwrap();
        let verifier = TokenVerifier::new(&other, store, StdDuration::from_millis(100));

        let now = Utc::now();
        let issued = issuer.issue_access(UserId::new(), Role::User, now).unwrap();
        assert_eq!(
            verifier.verify_stateless(&issued.token, TokenKind::Access, now),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn swapped_payload_fails_signature_check() {
        let (issuer, verifier, _) = setup();
        let now = Utc::now();
        let user_token = issuer.issue_access(UserId::new(), Role::User, now).unwrap().token;
        let admin_token = issuer.issue_access(UserId::new(), Role::Admin, now).unwrap().token;

        // Graft the admin payload onto the user token's signature.
        let user_parts: Vec<&str> = user_token.split('.').collect();
        let admin_parts: Vec<&str> = admin_token.split('.').collect();
        let forged = format!("{}.{}.{}", user_parts[0], admin_parts[1], user_parts[2]);

        assert_eq!(
            verifier.verify_stateless(&forged, TokenKind::Access, now),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let (_, verifier, _) = setup();
        assert!(matches!(
            verifier.verify_stateless("not.a.jwt", TokenKind::Access, Utc::now()),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            verifier.verify_stateless("", TokenKind::Access, Utc::now()),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn kind_confusion_is_rejected_both_ways() {
        let (issuer, verifier, _) = setup();
        let now = Utc::now();
        let user = UserId::new();

        let access = issuer.issue_access(user, Role::User, now).unwrap();
        let refresh = issuer.issue_refresh(user, Role::User, now).unwrap();

        assert!(matches!(
            verifier.verify_stateless(&access.token, TokenKind::Refresh, now),
            Err(TokenError::WrongTokenKind { .. })
        ));
        assert!(matches!(
            verifier.verify_stateless(&refresh.token, TokenKind::Access, now),
            Err(TokenError::WrongTokenKind { .. })
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let (issuer, verifier, _) = setup();
        let now = Utc::now();
        let issued = issuer.issue_access(UserId::new(), Role::User, now).unwrap();

        let later = issued.expires_at + Duration::seconds(1);
        assert_eq!(
            verifier.verify_stateless(&issued.token, TokenKind::Access, later),
            Err(TokenError::Expired)
        );
    }

    #[tokio::test]
    async fn revoked_refresh_token_is_rejected() {
        let (issuer, verifier, store) = setup();
        let now = Utc::now();
        let issued = issuer.issue_refresh(UserId::new(), Role::User, now).unwrap();

        store
            .insert_revocation(RevocationRecord {
                token_id: issued.token_id.unwrap(),
                revoked_at: now,
                expires_at: issued.expires_at,
            })
            .await
            .unwrap();

        assert_eq!(
            verifier.verify(&issued.token, TokenKind::Refresh, now).await,
            Err(TokenError::Revoked)
        );
        // Stateless verification does not consult the revocation set.
        assert!(verifier.verify_stateless(&issued.token, TokenKind::Refresh, now).is_ok());
    }

    #[tokio::test]
    async fn stalled_store_surfaces_as_unavailable() {
        let (issuer, verifier, store) = setup();
        let now = Utc::now();
        let issued = issuer.issue_refresh(UserId::new(), Role::User, now).unwrap();

        store.stall();
        assert!(matches!(
            verifier.verify(&issued.token, TokenKind::Refresh, now).await,
            Err(TokenError::StoreUnavailable(_))
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn kind() -> impl Strategy<Value = TokenKind> {
            prop_oneof![Just(TokenKind::Access), Just(TokenKind::Refresh)]
        }

        fn role() -> impl Strategy<Value = Role> {
            prop_oneof![Just(Role::User), Just(Role::Admin)]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            })]

            /// Property: a token only ever verifies as the kind it was issued as.
            #[test]
            fn kind_confusion_is_always_rejected(issued_as in kind(), asked_as in kind(), role in role()) {
                let (issuer, verifier, _) = setup();
                let now = Utc::now();
                let issued = issuer.issue(UserId::new(), role, issued_as, now).unwrap();

                let result = verifier.verify_stateless(&issued.token, asked_as, now);
                if issued_as == asked_as {
                    prop_assert!(result.is_ok());
                } else {
                    let is_wrong_kind = matches!(result, Err(TokenError::WrongTokenKind { .. }));
                    prop_assert!(is_wrong_kind);
                }
            }

            /// Property: once `now` passes expires-at, verification fails with `Expired`.
            #[test]
            fn expiry_is_enforced(kind in kind(), past_expiry_secs in 0i64..1_000_000) {
                let (issuer, verifier, _) = setup();
                let now = Utc::now();
                let issued = issuer.issue(UserId::new(), Role::User, kind, now).unwrap();

                let later = issued.expires_at + Duration::seconds(past_expiry_secs);
                prop_assert_eq!(
                    verifier.verify_stateless(&issued.token, kind, later),
                    Err(TokenError::Expired)
                );
            }
        }
    }
}
