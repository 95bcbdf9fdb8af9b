use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use moviestream_auth::{CredentialStore, store};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::AuthContext;

pub async fn hello() -> &'static str {
    "Hello, MovieStream!"
}

/// 200 while the credential store answers, 503 otherwise.
pub async fn health(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match store::bounded(services.config.store_timeout, services.credentials.ping()).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            errors::service_unavailable()
        }
    }
}

pub async fn whoami(Extension(ctx): Extension<AuthContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": ctx.user_id().to_string(),
        "role": ctx.role().as_str(),
    }))
}
