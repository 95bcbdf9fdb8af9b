//! Store selection and service wiring.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use moviestream_auth::{
    CredentialStore, Registrar, Registration, RegistrationError, Role, SessionManager,
};
use moviestream_catalog::{Catalog, MovieStore};
use moviestream_infra::{InMemoryCredentialStore, InMemoryMovieStore};

use crate::config::{AdminBootstrap, AppConfig};

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub sessions: SessionManager,
    pub registrar: Registrar,
    pub catalog: Catalog,
    pub credentials: Arc<dyn CredentialStore>,
    pub config: AppConfig,
}

/// Pick the stores (MongoDB when `MONGODB_URI` is set), wire the services and
/// run the optional admin bootstrap.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let (credentials, movies) = open_stores(config).await?;
    build_services_with(config, credentials, movies).await
}

/// Wire services over caller-supplied stores.
pub async fn build_services_with(
    config: &AppConfig,
    credentials: Arc<dyn CredentialStore>,
    movies: Arc<dyn MovieStore>,
) -> anyhow::Result<AppServices> {
    let tokens = config.token_config()?;
    let sessions = SessionManager::from_config(&tokens, config.session_config(), credentials.clone());
    let registrar = Registrar::new(credentials.clone(), config.store_timeout);
    let catalog =
        Catalog::new(movies, config.store_timeout).with_recommended_limit(config.recommended_limit);

    if let Some(admin) = &config.admin {
        bootstrap_admin(&registrar, admin).await?;
    }

    Ok(AppServices {
        sessions,
        registrar,
        catalog,
        credentials,
        config: config.clone(),
    })
}

#[cfg(feature = "mongo")]
async fn open_stores(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn CredentialStore>, Arc<dyn MovieStore>)> {
    match &config.mongodb_uri {
        Some(uri) => {
            let stores = moviestream_infra::mongo::connect(uri, &config.database_name).await?;
            let credentials: Arc<dyn CredentialStore> = stores.credentials;
            let movies: Arc<dyn MovieStore> = stores.movies;
            Ok((credentials, movies))
        }
        None => Ok(in_memory()),
    }
}

#[cfg(not(feature = "mongo"))]
async fn open_stores(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn CredentialStore>, Arc<dyn MovieStore>)> {
    if config.mongodb_uri.is_some() {
        anyhow::bail!("MONGODB_URI is set but this build lacks the `mongo` feature");
    }
    Ok(in_memory())
}

fn in_memory() -> (Arc<dyn CredentialStore>, Arc<dyn MovieStore>) {
    info!("using in-memory stores; data is lost on restart");
    (
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(InMemoryMovieStore::new()),
    )
}

async fn bootstrap_admin(registrar: &Registrar, admin: &AdminBootstrap) -> anyhow::Result<()> {
    let registration = Registration {
        email: admin.email.clone(),
        password: admin.password.clone(),
        first_name: "Admin".to_string(),
        last_name: "User".to_string(),
        favourite_genres: Vec::new(),
    };
    match registrar.register(registration, Role::Admin, Utc::now()).await {
        Ok(identity) => {
            info!(user_id = %identity.user_id, "admin account created");
            Ok(())
        }
        Err(RegistrationError::AlreadyRegistered) => {
            info!("admin account already present");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("admin bootstrap failed: {e}")),
    }
}
