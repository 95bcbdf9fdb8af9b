use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use moviestream_auth::{CredentialStore, Role, store};
use moviestream_catalog::{Movie, ReviewUpdate};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::AuthContext;

/// Catalog reads anyone may make.
pub fn public_router() -> Router {
    Router::new()
        .route("/movies", get(list_movies))
        .route("/genres", get(list_genres))
}

pub fn protected_router() -> Router {
    Router::new()
        .route("/movie/:imdb_id", get(get_movie))
        .route("/addmovie", post(add_movie))
        .route("/recommendedmovies", get(recommended_movies))
        .route("/updatereview/:imdb_id", patch(update_review))
}

pub async fn list_movies(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.list_movies().await {
        Ok(movies) => Json(movies).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_genres(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.list_genres().await {
        Ok(genres) => Json(genres).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn get_movie(
    Extension(services): Extension<Arc<AppServices>>,
    Path(imdb_id): Path<String>,
) -> axum::response::Response {
    match services.catalog.get_movie(&imdb_id).await {
        Ok(movie) => Json(movie).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn add_movie(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<Movie>,
) -> axum::response::Response {
    match services.catalog.add_movie(body).await {
        Ok(movie) => {
            tracing::debug!(user_id = %ctx.user_id(), imdb_id = %movie.imdb_id, "movie submitted");
            (StatusCode::CREATED, Json(movie)).into_response()
        }
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn recommended_movies(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> axum::response::Response {
    let identity = match store::bounded(
        services.config.store_timeout,
        services.credentials.find_identity_by_id(ctx.user_id()),
    )
    .await
    {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            return errors::json_error(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "account no longer exists",
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "credential store unavailable");
            return errors::service_unavailable();
        }
    };

    match services.catalog.recommended(&identity.favourite_genres).await {
        Ok(movies) => Json(movies).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn update_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Path(imdb_id): Path<String>,
    Json(body): Json<ReviewUpdate>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_role(&ctx, Role::Admin) {
        tracing::warn!(user_id = %ctx.user_id(), role = %ctx.role(), "review update forbidden");
        return errors::authz_error_to_response(e);
    }

    match services.catalog.update_review(&imdb_id, body).await {
        Ok(movie) => Json(movie).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
