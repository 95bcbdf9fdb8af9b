use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::warn;

use moviestream_auth::{TokenVerifier, authenticate};

use crate::app::errors::json_error;
use crate::context::AuthContext;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: TokenVerifier,
}

/// Gate for protected routes: a valid access token or 401.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).map_err(|_| unauthenticated())?;

    let principal = authenticate(&state.verifier, token, Utc::now()).map_err(|_| {
        warn!(path = %req.uri().path(), "rejected bearer token");
        unauthenticated()
    })?;

    req.extensions_mut().insert(AuthContext::new(principal));

    Ok(next.run(req).await)
}

fn unauthenticated() -> Response {
    json_error(
        StatusCode::UNAUTHORIZED,
        "unauthenticated",
        "missing or invalid access token",
    )
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
