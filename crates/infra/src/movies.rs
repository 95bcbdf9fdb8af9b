use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use moviestream_catalog::{CatalogError, Genre, Movie, MovieStore, ReviewUpdate, recommend};

/// In-memory movie/genre store for tests/dev.
///
/// Genres referenced by inserted movies are registered automatically.
#[derive(Debug, Default)]
pub struct InMemoryMovieStore {
    movies: RwLock<BTreeMap<String, Movie>>,
    genres: RwLock<BTreeMap<i32, Genre>>,
}

impl InMemoryMovieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_genres(genres: impl IntoIterator<Item = Genre>) -> Self {
        let store = Self::default();
        if let Ok(mut map) = store.genres.write() {
            map.extend(genres.into_iter().map(|g| (g.genre_id, g)));
        }
        store
    }
}

fn poisoned() -> CatalogError {
    CatalogError::StoreUnavailable("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl MovieStore for InMemoryMovieStore {
    async fn list_movies(&self) -> Result<Vec<Movie>, CatalogError> {
        let map = self.movies.read().map_err(|_| poisoned())?;
        Ok(map.values().cloned().collect())
    }

    async fn list_genres(&self) -> Result<Vec<Genre>, CatalogError> {
        let map = self.genres.read().map_err(|_| poisoned())?;
        Ok(map.values().cloned().collect())
    }

    async fn get_movie(&self, imdb_id: &str) -> Result<Option<Movie>, CatalogError> {
        let map = self.movies.read().map_err(|_| poisoned())?;
        Ok(map.get(imdb_id).cloned())
    }

    async fn insert_movie(&self, movie: Movie) -> Result<(), CatalogError> {
        {
            let mut map = self.movies.write().map_err(|_| poisoned())?;
            if map.contains_key(&movie.imdb_id) {
                return Err(CatalogError::AlreadyExists(movie.imdb_id));
            }
            map.insert(movie.imdb_id.clone(), movie.clone());
        }
        let mut genres = self.genres.write().map_err(|_| poisoned())?;
        for g in movie.genre {
            genres.entry(g.genre_id).or_insert(g);
        }
        Ok(())
    }

    async fn update_review(
        &self,
        imdb_id: &str,
        update: ReviewUpdate,
    ) -> Result<Movie, CatalogError> {
        let mut map = self.movies.write().map_err(|_| poisoned())?;
        let movie = map.get_mut(imdb_id).ok_or(CatalogError::NotFound)?;
        update.apply(movie);
        Ok(movie.clone())
    }

    async fn movies_in_genres(
        &self,
        genres: &[String],
        limit: usize,
    ) -> Result<Vec<Movie>, CatalogError> {
        let all = self.list_movies().await?;
        Ok(recommend(all, genres, limit))
    }
}
