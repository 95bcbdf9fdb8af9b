use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use moviestream_core::{TokenId, UserId};

use crate::Role;

/// Which flavour of token a JWT is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT payload as it travels on the wire.
///
/// Access tokens carry `role` and no `jti`; refresh tokens carry `jti` and no
/// `role`. Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the identity the token was issued to.
    pub sub: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Issued-at.
    pub iat: i64,

    /// Expires-at.
    pub exp: i64,

    pub kind: TokenKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<TokenId>,
}

/// Claims of a token that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub user_id: UserId,
    pub kind: TokenKind,
    /// Present for access tokens.
    pub role: Option<Role>,
    /// Present for refresh tokens.
    pub token_id: Option<TokenId>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token subject is empty")]
    EmptyIdentity,

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("wrong token kind: expected {expected}, found {found}")]
    WrongTokenKind { expected: TokenKind, found: TokenKind },

    #[error("token has expired")]
    Expired,

    #[error("token has been revoked")]
    Revoked,

    #[error("revocation store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Check decoded claims against the expected kind and the current time.
///
/// Runs after the signature has been checked. Kind is checked before expiry
/// so that a stale token of the wrong kind is reported as a kind mismatch.
pub fn validate_claims(
    claims: &TokenClaims,
    expected: TokenKind,
    now: DateTime<Utc>,
) -> Result<VerifiedClaims, TokenError> {
    if claims.kind != expected {
        return Err(TokenError::WrongTokenKind {
            expected,
            found: claims.kind,
        });
    }
    if claims.exp <= claims.iat {
        return Err(TokenError::Malformed("expires_at <= issued_at".to_string()));
    }
    if now.timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }

    match claims.kind {
        TokenKind::Access if claims.role.is_none() => {
            return Err(TokenError::Malformed("access token without role".to_string()));
        }
        TokenKind::Refresh if claims.jti.is_none() => {
            return Err(TokenError::Malformed("refresh token without jti".to_string()));
        }
        _ => {}
    }

    let issued_at = timestamp(claims.iat)?;
    let expires_at = timestamp(claims.exp)?;

    Ok(VerifiedClaims {
        user_id: claims.sub,
        kind: claims.kind,
        role: claims.role,
        token_id: claims.jti,
        issued_at,
        expires_at,
    })
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| TokenError::Malformed(format!("timestamp out of range: {secs}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn access_claims(now: DateTime<Utc>) -> TokenClaims {
        TokenClaims {
            sub: UserId::new(),
            role: Some(Role::User),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(15)).timestamp(),
            kind: TokenKind::Access,
            jti: None,
        }
    }

    #[test]
    fn valid_access_claims_pass() {
        let now = Utc::now();
        let claims = access_claims(now);
        let verified = validate_claims(&claims, TokenKind::Access, now).unwrap();
        assert_eq!(verified.user_id, claims.sub);
        assert_eq!(verified.role, Some(Role::User));
        assert_eq!(verified.token_id, None);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let claims = access_claims(now);
        let at_expiry = DateTime::from_timestamp(claims.exp, 0).unwrap();
        assert_eq!(
            validate_claims(&claims, TokenKind::Access, at_expiry),
            Err(TokenError::Expired)
        );
        let just_before = at_expiry - Duration::seconds(1);
        assert!(validate_claims(&claims, TokenKind::Access, just_before).is_ok());
    }

    #[test]
    fn kind_is_checked_before_expiry() {
        let now = Utc::now();
        let claims = access_claims(now);
        let later = now + Duration::days(1);
        assert!(matches!(
            validate_claims(&claims, TokenKind::Refresh, later),
            Err(TokenError::WrongTokenKind { expected: TokenKind::Refresh, found: TokenKind::Access })
        ));
    }

    #[test]
    fn refresh_without_jti_is_malformed() {
        let now = Utc::now();
        let claims = TokenClaims {
            role: None,
            kind: TokenKind::Refresh,
            ..access_claims(now)
        };
        assert!(matches!(
            validate_claims(&claims, TokenKind::Refresh, now),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn inverted_time_window_is_malformed() {
        let now = Utc::now();
        let mut claims = access_claims(now);
        claims.exp = claims.iat;
        assert!(matches!(
            validate_claims(&claims, TokenKind::Access, now),
            Err(TokenError::Malformed(_))
        ));
    }
}
