use serde::{Deserialize, Serialize};

use moviestream_core::{DomainError, DomainResult};

pub const MIN_TITLE_LEN: usize = 2;
pub const MAX_TITLE_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Genre {
    pub genre_id: i32,
    pub genre_name: String,
}

/// Editorial ranking. Lower `ranking_value` ranks higher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub ranking_value: i32,
    pub ranking_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub imdb_id: String,
    pub title: String,
    pub poster_path: String,
    pub youtube_id: String,
    pub genre: Vec<Genre>,
    #[serde(default)]
    pub admin_review: String,
    pub ranking: Ranking,
}

/// Admin edit of a movie's review, optionally re-ranking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewUpdate {
    pub admin_review: String,
    #[serde(default)]
    pub ranking: Option<Ranking>,
}

/// `tt` followed by at least one digit.
pub fn validate_imdb_id(imdb_id: &str) -> DomainResult<()> {
    let digits = imdb_id
        .strip_prefix("tt")
        .ok_or_else(|| DomainError::invalid_id(format!("imdb id must start with 'tt': {imdb_id}")))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::invalid_id(format!("malformed imdb id: {imdb_id}")));
    }
    Ok(())
}

impl Movie {
    pub fn validate(&self) -> DomainResult<()> {
        validate_imdb_id(&self.imdb_id)?;

        let title_len = self.title.trim().chars().count();
        if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&title_len) {
            return Err(DomainError::validation(format!(
                "title must be {MIN_TITLE_LEN}-{MAX_TITLE_LEN} characters"
            )));
        }
        if !(self.poster_path.starts_with("http://") || self.poster_path.starts_with("https://")) {
            return Err(DomainError::validation("poster_path must be an http(s) url"));
        }
        if self.youtube_id.trim().is_empty() {
            return Err(DomainError::validation("youtube_id is required"));
        }
        if self.genre.is_empty() {
            return Err(DomainError::validation("at least one genre is required"));
        }
        if self.genre.iter().any(|g| g.genre_name.trim().is_empty()) {
            return Err(DomainError::validation("genre_name must not be empty"));
        }
        self.ranking.validate()
    }

    pub fn has_any_genre(&self, names: &[String]) -> bool {
        self.genre
            .iter()
            .any(|g| names.iter().any(|n| n.eq_ignore_ascii_case(&g.genre_name)))
    }
}

impl Ranking {
    pub fn validate(&self) -> DomainResult<()> {
        if self.ranking_name.trim().is_empty() {
            return Err(DomainError::validation("ranking_name is required"));
        }
        Ok(())
    }
}

impl ReviewUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        if self.admin_review.trim().is_empty() {
            return Err(DomainError::validation("admin_review must not be empty"));
        }
        match &self.ranking {
            Some(ranking) => ranking.validate(),
            None => Ok(()),
        }
    }

    pub fn apply(&self, movie: &mut Movie) {
        movie.admin_review = self.admin_review.trim().to_string();
        if let Some(ranking) = &self.ranking {
            movie.ranking = ranking.clone();
        }
    }
}

/// Movies sharing a genre with `favourite_genres`, best ranked first, at most
/// `limit` of them. Ties keep their input order.
pub fn recommend(movies: Vec<Movie>, favourite_genres: &[String], limit: usize) -> Vec<Movie> {
    let mut matching: Vec<Movie> = movies
        .into_iter()
        .filter(|m| m.has_any_genre(favourite_genres))
        .collect();
    matching.sort_by_key(|m| m.ranking.ranking_value);
    matching.truncate(limit);
    matching
}

#[cfg(test)]
pub(crate) fn sample_movie(imdb_id: &str, genre: &str, ranking_value: i32) -> Movie {
    Movie {
        imdb_id: imdb_id.to_string(),
        title: format!("Movie {imdb_id}"),
        poster_path: format!("https://img.example.com/{imdb_id}.jpg"),
        youtube_id: "dQw4w9WgXcQ".to_string(),
        genre: vec![Genre {
            genre_id: 1,
            genre_name: genre.to_string(),
        }],
        admin_review: String::new(),
        ranking: Ranking {
            ranking_value,
            ranking_name: "Good".to_string(),
        },
    }
}
