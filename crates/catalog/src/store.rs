use async_trait::async_trait;
use thiserror::Error;

use moviestream_core::DomainError;

use crate::movie::{Genre, Movie, ReviewUpdate};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{0}")]
    Invalid(#[from] DomainError),

    #[error("movie not found")]
    NotFound,

    #[error("movie already exists: {0}")]
    AlreadyExists(String),

    #[error("movie store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Persistence contract for movies and genres.
#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn list_movies(&self) -> Result<Vec<Movie>, CatalogError>;

    async fn list_genres(&self) -> Result<Vec<Genre>, CatalogError>;

    async fn get_movie(&self, imdb_id: &str) -> Result<Option<Movie>, CatalogError>;

    /// `AlreadyExists` when the imdb id is taken.
    async fn insert_movie(&self, movie: Movie) -> Result<(), CatalogError>;

    /// Returns the updated movie, or `NotFound`.
    async fn update_review(&self, imdb_id: &str, update: ReviewUpdate)
    -> Result<Movie, CatalogError>;

    /// Movies in any of `genres`, best ranked first, at most `limit`.
    async fn movies_in_genres(
        &self,
        genres: &[String],
        limit: usize,
    ) -> Result<Vec<Movie>, CatalogError>;
}
