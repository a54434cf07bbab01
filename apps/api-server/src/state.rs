//! Application state - shared across all handlers.

use std::sync::Arc;

use folio_core::ports::{ContentRepository, UserRepository};
use folio_core::{ContentEngine, EngineConfig};
use folio_infra::{DatabaseConfig, DatabaseConnections};
use folio_infra::{InMemoryContentRepository, InMemoryUserRepository};

#[cfg(feature = "postgres")]
use folio_infra::{PostgresContentRepository, PostgresUserRepository};

type Repositories = (Arc<dyn ContentRepository>, Arc<dyn UserRepository>);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: ContentEngine,
    pub db: Option<Arc<DatabaseConnections>>,
}

impl AppState {
    /// Build the state over Postgres when configured and reachable,
    /// otherwise over the in-memory store.
    pub async fn new(db_config: Option<&DatabaseConfig>, engine: EngineConfig) -> Self {
        #[cfg(feature = "postgres")]
        let (db, (repo, users)) = match db_config {
            Some(config) => match DatabaseConnections::init(config).await {
                Ok(connections) => {
                    let conn = Arc::new(connections);
                    let repos: Repositories = (
                        Arc::new(PostgresContentRepository::new(conn.main.clone())),
                        Arc::new(PostgresUserRepository::new(conn.main.clone())),
                    );
                    (Some(conn), repos)
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to connect to database: {}. Using in-memory store.",
                        e
                    );
                    (None, in_memory())
                }
            },
            None => {
                tracing::warn!("DATABASE_URL not set. Running with the in-memory store.");
                (None, in_memory())
            }
        };

        #[cfg(not(feature = "postgres"))]
        let (db, (repo, users)) = {
            if db_config.is_some() {
                tracing::warn!("Built without postgres feature - ignoring DATABASE_URL");
            }
            (None::<Arc<DatabaseConnections>>, in_memory())
        };

        tracing::info!(persistent = db.is_some(), "Application state initialized");

        Self::with_repositories(repo, users, engine, db)
    }

    pub fn with_repositories(
        repo: Arc<dyn ContentRepository>,
        users: Arc<dyn UserRepository>,
        engine: EngineConfig,
        db: Option<Arc<DatabaseConnections>>,
    ) -> Self {
        Self {
            engine: ContentEngine::new(repo, users, engine),
            db,
        }
    }
}

fn in_memory() -> Repositories {
    (
        Arc::new(InMemoryContentRepository::new()),
        Arc::new(InMemoryUserRepository::new()),
    )
}
