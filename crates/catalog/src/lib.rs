//! Movie catalog domain module.
//!
//! Movie and genre records, their validation rules, and the [`MovieStore`]
//! contract the HTTP layer reads and writes through. No storage lives here.

pub mod movie;
pub mod service;
pub mod store;

pub use movie::{Genre, Movie, Ranking, ReviewUpdate, recommend};
pub use service::Catalog;
pub use store::{CatalogError, MovieStore};
