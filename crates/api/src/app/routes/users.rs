use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use moviestream_auth::Credentials;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    let identity = match services
        .registrar
        .register(body.into(), moviestream_auth::Role::User, Utc::now())
        .await
    {
        Ok(i) => i,
        Err(e) => return errors::registration_error_to_response(e),
    };

    (StatusCode::CREATED, Json(dto::UserResponse::from(&identity))).into_response()
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let credentials = Credentials {
        username: body.email,
        password: body.password,
    };

    let now = Utc::now();
    match services.sessions.login(&credentials, now).await {
        Ok(outcome) => Json(dto::LoginResponse::new(&outcome, now)).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RefreshTokenRequest>,
) -> axum::response::Response {
    let now = Utc::now();
    match services.sessions.refresh(&body.refresh_token, now).await {
        Ok(outcome) => Json(dto::refresh_response(&outcome, now)).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RefreshTokenRequest>,
) -> axum::response::Response {
    match services.sessions.logout(&body.refresh_token, Utc::now()).await {
        Ok(()) => Json(serde_json::json!({ "message": "logged out" })).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}
