//! MongoDB-backed stores (feature `mongo`).

mod credentials;
mod movies;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::info;

pub use credentials::MongoCredentialStore;
pub use movies::MongoMovieStore;

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Both stores, sharing one client.
#[derive(Debug, Clone)]
pub struct MongoStores {
    pub credentials: Arc<MongoCredentialStore>,
    pub movies: Arc<MongoMovieStore>,
}

/// Connect, ping, and make sure indexes exist.
pub async fn connect(uri: &str, database: &str) -> anyhow::Result<MongoStores> {
    let mut options = ClientOptions::parse(uri)
        .await
        .context("invalid MONGODB_URI")?;
    options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
    options.connect_timeout = Some(CONNECT_TIMEOUT);

    let client = Client::with_options(options).context("failed to build MongoDB client")?;
    let db: Database = client.database(database);
    db.run_command(doc! { "ping": 1 })
        .await
        .context("MongoDB ping failed")?;
    info!(database, "connected to MongoDB");

    let credentials = MongoCredentialStore::new(&db);
    credentials
        .ensure_indexes()
        .await
        .context("failed to create credential indexes")?;

    let movies = MongoMovieStore::new(&db);
    movies
        .ensure_indexes()
        .await
        .context("failed to create movie indexes")?;

    Ok(MongoStores {
        credentials: Arc::new(credentials),
        movies: Arc::new(movies),
    })
}

pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == 11000
    )
}
