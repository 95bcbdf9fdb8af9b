use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use moviestream_auth::{Identity, IssuedToken, LoginOutcome, RefreshOutcome, Registration, Role};
use moviestream_catalog::Genre;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub favourite_genres: Vec<Genre>,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Registration {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            favourite_genres: req.favourite_genres.into_iter().map(|g| g.genre_name).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `/refresh` and `/logout`.
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub favourite_genres: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for UserResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.to_string(),
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            role: identity.role,
            favourite_genres: identity.favourite_genres.clone(),
            created_at: identity.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub token_type: &'static str,
    pub access_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<i64>,
}

impl TokenPair {
    fn new(access: &IssuedToken, refresh: Option<&IssuedToken>, now: DateTime<Utc>) -> Self {
        Self {
            token_type: "Bearer",
            access_token: access.token.clone(),
            expires_in: access.expires_in(now),
            refresh_token: refresh.map(|r| r.token.clone()),
            refresh_expires_in: refresh.map(|r| r.expires_in(now)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

impl LoginResponse {
    pub fn new(outcome: &LoginOutcome, now: DateTime<Utc>) -> Self {
        Self {
            user: UserResponse::from(&outcome.identity),
            tokens: TokenPair::new(&outcome.access, Some(&outcome.refresh), now),
        }
    }
}

pub fn refresh_response(outcome: &RefreshOutcome, now: DateTime<Utc>) -> TokenPair {
    TokenPair::new(&outcome.access, outcome.refresh.as_ref(), now)
}
