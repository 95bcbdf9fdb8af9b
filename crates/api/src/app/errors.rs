use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use moviestream_auth::{AuthzError, RegistrationError, SessionError};
use moviestream_catalog::CatalogError;

pub fn session_error_to_response(err: SessionError) -> axum::response::Response {
    match err {
        // One message for both, so the response does not reveal which emails exist.
        SessionError::UserNotFound | SessionError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_login",
            "invalid email or password",
        ),
        SessionError::RefreshRejected => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_refresh_token",
            "refresh token is invalid, expired or revoked",
        ),
        SessionError::StoreUnavailable(msg) => {
            error!(error = %msg, "credential store unavailable");
            service_unavailable()
        }
        SessionError::Signing(msg) => {
            error!(error = %msg, "token signing failed");
            internal_error()
        }
        SessionError::Hashing(msg) => {
            error!(error = %msg, "password verification task failed");
            internal_error()
        }
    }
}

pub fn registration_error_to_response(err: RegistrationError) -> axum::response::Response {
    match err {
        RegistrationError::Invalid(e) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        RegistrationError::AlreadyRegistered => {
            json_error(StatusCode::CONFLICT, "conflict", "email already registered")
        }
        RegistrationError::Hashing(msg) => {
            error!(error = %msg, "password hashing failed");
            internal_error()
        }
        RegistrationError::StoreUnavailable(msg) => {
            error!(error = %msg, "credential store unavailable");
            service_unavailable()
        }
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::Invalid(e) => json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        CatalogError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "movie not found"),
        CatalogError::AlreadyExists(id) => json_error(
            StatusCode::CONFLICT,
            "conflict",
            format!("movie {id} already exists"),
        ),
        CatalogError::StoreUnavailable(msg) => {
            error!(error = %msg, "movie store unavailable");
            service_unavailable()
        }
    }
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn service_unavailable() -> axum::response::Response {
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "service_unavailable",
        "a backing store is unavailable, try again later",
    )
}

pub fn internal_error() -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
