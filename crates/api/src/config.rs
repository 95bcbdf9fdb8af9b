//! Process configuration, read once at startup.

use std::collections::HashMap;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use axum::http::HeaderValue;

use moviestream_auth::{RefreshPolicy, SessionConfig, TokenConfig};

pub const MIN_SECRET_LEN: usize = 32;
pub const MAX_ACCESS_TTL_MINUTES: i64 = 24 * 60;
pub const MAX_REFRESH_TTL_DAYS: i64 = 365;
pub const DEFAULT_DATABASE_NAME: &str = "movie_stream_db";

#[derive(Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
    pub refresh_policy: RefreshPolicy,
    pub store_timeout: Duration,
    pub sweep_every: Duration,
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<HeaderValue>,
    pub mongodb_uri: Option<String>,
    pub database_name: String,
    pub admin: Option<AdminBootstrap>,
    pub recommended_limit: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("refresh_policy", &self.refresh_policy)
            .field("store_timeout", &self.store_timeout)
            .field("sweep_every", &self.sweep_every)
            .field("bind_addr", &self.bind_addr)
            .field("allowed_origins", &self.allowed_origins)
            .field("mongodb", &self.mongodb_uri.is_some())
            .field("database_name", &self.database_name)
            .field("admin", &self.admin)
            .field("recommended_limit", &self.recommended_limit)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("failed to read .env"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }

        let access_minutes: i64 = parse_or(
            &get,
            "ACCESS_TOKEN_TTL_MINUTES",
            TokenConfig::DEFAULT_ACCESS_TTL_MINUTES,
        )?;
        let refresh_days: i64 =
            parse_or(&get, "REFRESH_TOKEN_TTL_DAYS", TokenConfig::DEFAULT_REFRESH_TTL_DAYS)?;
        if !(1..=MAX_ACCESS_TTL_MINUTES).contains(&access_minutes) {
            bail!("ACCESS_TOKEN_TTL_MINUTES must be between 1 and {MAX_ACCESS_TTL_MINUTES}");
        }
        if !(1..=MAX_REFRESH_TTL_DAYS).contains(&refresh_days) {
            bail!("REFRESH_TOKEN_TTL_DAYS must be between 1 and {MAX_REFRESH_TTL_DAYS}");
        }

        let refresh_policy = if parse_or(&get, "REFRESH_TOKEN_ROTATION", false)? {
            RefreshPolicy::Rotate
        } else {
            RefreshPolicy::Reuse
        };

        let store_timeout_ms: u64 = parse_or(&get, "STORE_TIMEOUT_MS", 5000)?;
        let sweep_secs: u64 = parse_or(&get, "REVOCATION_SWEEP_SECS", 300)?;
        if store_timeout_ms == 0 || sweep_secs == 0 {
            bail!("STORE_TIMEOUT_MS and REVOCATION_SWEEP_SECS must be positive");
        }

        let bind_addr = parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let allowed_origins = get("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(|o| {
                if o == "*" {
                    bail!("ALLOWED_ORIGINS must list explicit origins, not '*'");
                }
                HeaderValue::from_str(o).with_context(|| format!("invalid origin: {o}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap { email, password }),
            (None, None) => None,
            _ => bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            jwt_secret,
            access_ttl: chrono::Duration::minutes(access_minutes),
            refresh_ttl: chrono::Duration::days(refresh_days),
            refresh_policy,
            store_timeout: Duration::from_millis(store_timeout_ms),
            sweep_every: Duration::from_secs(sweep_secs),
            bind_addr,
            allowed_origins,
            mongodb_uri: get("MONGODB_URI"),
            database_name: get("DATABASE_NAME").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
            admin,
            recommended_limit: parse_or(&get, "RECOMMENDED_MOVIE_LIMIT", 5)?,
        })
    }

    pub fn token_config(&self) -> anyhow::Result<TokenConfig> {
        Ok(TokenConfig::new(self.jwt_secret.as_bytes())?
            .with_access_ttl(self.access_ttl)
            .with_refresh_ttl(self.refresh_ttl))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            refresh_policy: self.refresh_policy,
            store_timeout: self.store_timeout,
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        None => Ok(default),
    }
}
