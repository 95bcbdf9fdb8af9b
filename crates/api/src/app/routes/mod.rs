use axum::{Router, routing::get};

pub mod movies;
pub mod system;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/hello", get(system::hello))
        .route("/health", get(system::health))
        .merge(users::router())
        .merge(movies::public_router())
}

/// Endpoints behind the auth middleware.
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(movies::protected_router())
}
