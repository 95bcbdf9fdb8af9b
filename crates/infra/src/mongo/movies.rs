use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Document, doc};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};

use moviestream_catalog::{CatalogError, Genre, Movie, MovieStore, ReviewUpdate};

use super::is_duplicate_key;

#[derive(Debug, Clone)]
pub struct MongoMovieStore {
    movies: Collection<Movie>,
    genres: Collection<Genre>,
}

impl MongoMovieStore {
    pub fn new(db: &Database) -> Self {
        Self {
            movies: db.collection("movies"),
            genres: db.collection("genres"),
        }
    }

    pub async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();
        self.movies
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "imdb_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.genres
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "genre_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        Ok(())
    }
}

fn unavailable(err: impl std::fmt::Display) -> CatalogError {
    CatalogError::StoreUnavailable(err.to_string())
}

#[async_trait]
impl MovieStore for MongoMovieStore {
    async fn list_movies(&self) -> Result<Vec<Movie>, CatalogError> {
        self.movies
            .find(doc! {})
            .await
            .map_err(unavailable)?
            .try_collect()
            .await
            .map_err(unavailable)
    }

    async fn list_genres(&self) -> Result<Vec<Genre>, CatalogError> {
        self.genres
            .find(doc! {})
            .sort(doc! { "genre_id": 1 })
            .await
            .map_err(unavailable)?
            .try_collect()
            .await
            .map_err(unavailable)
    }

    async fn get_movie(&self, imdb_id: &str) -> Result<Option<Movie>, CatalogError> {
        self.movies
            .find_one(doc! { "imdb_id": imdb_id })
            .await
            .map_err(unavailable)
    }

    async fn insert_movie(&self, movie: Movie) -> Result<(), CatalogError> {
        match self.movies.insert_one(&movie).await {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => return Err(CatalogError::AlreadyExists(movie.imdb_id)),
            Err(e) => return Err(unavailable(e)),
        }
        for g in &movie.genre {
            self.genres
                .update_one(
                    doc! { "genre_id": g.genre_id },
                    doc! { "$setOnInsert": { "genre_name": g.genre_name.clone() } },
                )
                .upsert(true)
                .await
                .map_err(unavailable)?;
        }
        Ok(())
    }

    async fn update_review(
        &self,
        imdb_id: &str,
        update: ReviewUpdate,
    ) -> Result<Movie, CatalogError> {
        let mut set: Document = doc! { "admin_review": update.admin_review.trim() };
        if let Some(ranking) = &update.ranking {
            set.insert("ranking", bson::to_bson(ranking).map_err(unavailable)?);
        }

        self.movies
            .find_one_and_update(doc! { "imdb_id": imdb_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(unavailable)?
            .ok_or(CatalogError::NotFound)
    }

    async fn movies_in_genres(
        &self,
        genres: &[String],
        limit: usize,
    ) -> Result<Vec<Movie>, CatalogError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.movies
            .find(doc! { "genre.genre_name": { "$in": genres.to_vec() } })
            .sort(doc! { "ranking.ranking_value": 1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(unavailable)?
            .try_collect()
            .await
            .map_err(unavailable)
    }
}
