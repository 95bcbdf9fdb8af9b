use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::movie::{Genre, Movie, ReviewUpdate, validate_imdb_id};
use crate::store::{CatalogError, MovieStore};

/// Catalog operations: input validation and bounded store access.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn MovieStore>,
    store_timeout: Duration,
    recommended_limit: usize,
}

impl Catalog {
    pub const DEFAULT_RECOMMENDED_LIMIT: usize = 5;

    pub fn new(store: Arc<dyn MovieStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
            recommended_limit: Self::DEFAULT_RECOMMENDED_LIMIT,
        }
    }

    pub fn with_recommended_limit(mut self, limit: usize) -> Self {
        self.recommended_limit = limit;
        self
    }

    pub async fn list_movies(&self) -> Result<Vec<Movie>, CatalogError> {
        self.bounded(self.store.list_movies()).await
    }

    pub async fn list_genres(&self) -> Result<Vec<Genre>, CatalogError> {
        self.bounded(self.store.list_genres()).await
    }

    pub async fn get_movie(&self, imdb_id: &str) -> Result<Movie, CatalogError> {
        validate_imdb_id(imdb_id)?;
        self.bounded(self.store.get_movie(imdb_id))
            .await?
            .ok_or(CatalogError::NotFound)
    }

    pub async fn add_movie(&self, mut movie: Movie) -> Result<Movie, CatalogError> {
        movie.validate()?;
        movie.title = movie.title.trim().to_string();
        self.bounded(self.store.insert_movie(movie.clone())).await?;
        info!(imdb_id = %movie.imdb_id, "movie added");
        Ok(movie)
    }

    pub async fn update_review(
        &self,
        imdb_id: &str,
        update: ReviewUpdate,
    ) -> Result<Movie, CatalogError> {
        validate_imdb_id(imdb_id)?;
        update.validate()?;
        let movie = self.bounded(self.store.update_review(imdb_id, update)).await?;
        info!(imdb_id, "admin review updated");
        Ok(movie)
    }

    /// Best-ranked movies in the caller's favourite genres. No favourites, no
    /// recommendations.
    pub async fn recommended(&self, favourite_genres: &[String]) -> Result<Vec<Movie>, CatalogError> {
        if favourite_genres.is_empty() {
            return Ok(Vec::new());
        }
        self.bounded(
            self.store
                .movies_in_genres(favourite_genres, self.recommended_limit),
        )
        .await
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CatalogError>
    where
        F: Future<Output = Result<T, CatalogError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.store_timeout, "movie store call timed out");
                Err(CatalogError::StoreUnavailable(format!(
                    "timed out after {:?}",
                    self.store_timeout
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::movie::{recommend, sample_movie};

    #[derive(Default)]
    struct MapStore {
        movies: Mutex<BTreeMap<String, Movie>>,
        stalled: bool,
    }

    #[async_trait]
    impl MovieStore for MapStore {
        async fn list_movies(&self) -> Result<Vec<Movie>, CatalogError> {
            if self.stalled {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(self.movies.lock().unwrap().values().cloned().collect())
        }

        async fn list_genres(&self) -> Result<Vec<Genre>, CatalogError> {
            Ok(Vec::new())
        }

        async fn get_movie(&self, imdb_id: &str) -> Result<Option<Movie>, CatalogError> {
            Ok(self.movies.lock().unwrap().get(imdb_id).cloned())
        }

        async fn insert_movie(&self, movie: Movie) -> Result<(), CatalogError> {
            let mut map = self.movies.lock().unwrap();
            if map.contains_key(&movie.imdb_id) {
                return Err(CatalogError::AlreadyExists(movie.imdb_id));
            }
            map.insert(movie.imdb_id.clone(), movie);
            Ok(())
        }

        async fn update_review(
            &self,
            imdb_id: &str,
            update: ReviewUpdate,
        ) -> Result<Movie, CatalogError> {
            let mut map = self.movies.lock().unwrap();
            let movie = map.get_mut(imdb_id).ok_or(CatalogError::NotFound)?;
            update.apply(movie);
            Ok(movie.clone())
        }

        async fn movies_in_genres(
            &self,
            genres: &[String],
            limit: usize,
        ) -> Result<Vec<Movie>, CatalogError> {
            let all = self.movies.lock().unwrap().values().cloned().collect();
            Ok(recommend(all, genres, limit))
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(MapStore::default()), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn add_then_get() {
        let catalog = catalog();
        catalog.add_movie(sample_movie("tt0111161", "Drama", 1)).await.unwrap();

        let movie = catalog.get_movie("tt0111161").await.unwrap();
        assert_eq!(movie.imdb_id, "tt0111161");
        assert_eq!(catalog.list_movies().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_add_conflicts() {
        let catalog = catalog();
        catalog.add_movie(sample_movie("tt0111161", "Drama", 1)).await.unwrap();
        let err = catalog
            .add_movie(sample_movie("tt0111161", "Drama", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn unknown_movie_is_not_found_and_bad_id_is_invalid() {
        let catalog = catalog();
        assert_eq!(catalog.get_movie("tt404").await, Err(CatalogError::NotFound));
        assert!(matches!(
            catalog.get_movie("nope").await,
            Err(CatalogError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn review_update_applies() {
        let catalog = catalog();
        catalog.add_movie(sample_movie("tt0111161", "Drama", 2)).await.unwrap();

        let updated = catalog
            .update_review(
                "tt0111161",
                ReviewUpdate {
                    admin_review: "Hope is a good thing.".to_string(),
                    ranking: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.admin_review, "Hope is a good thing.");
        assert_eq!(updated.ranking.ranking_value, 2);
    }

    #[tokio::test]
    async fn recommendations_respect_limit_and_favourites() {
        let catalog = catalog().with_recommended_limit(1);
        catalog.add_movie(sample_movie("tt1", "Drama", 2)).await.unwrap();
        catalog.add_movie(sample_movie("tt2", "Drama", 1)).await.unwrap();

        let picked = catalog.recommended(&["Drama".to_string()]).await.unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].imdb_id, "tt2");

        assert!(catalog.recommended(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stalled_store_times_out() {
        let catalog = Catalog::new(
            Arc::new(MapStore {
                stalled: true,
                ..MapStore::default()
            }),
            Duration::from_millis(50),
        );
        assert!(matches!(
            catalog.list_movies().await,
            Err(CatalogError::StoreUnavailable(_))
        ));
    }
}
