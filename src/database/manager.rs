use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use super::backend::ResourceBackend;
use super::memory::MemoryBackend;
use super::models::{Address, Profile};
use super::postgres::PgBackend;
use super::store::GuardedStore;
use crate::config::{DatabaseConfig, StoreBackend};

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Guarded stores for every resource kind, sharing one backend choice.
#[derive(Clone)]
pub struct Stores {
    pub profiles: GuardedStore<Profile>,
    pub addresses: GuardedStore<Address>,
}

/// Builds the persistence layer selected by configuration.
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<Stores, DatabaseError> {
        let timeout = Duration::from_millis(config.query_timeout_ms);

        match config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory resource store");
                Ok(Self::memory(timeout))
            }
            StoreBackend::Postgres => {
                let pool = Self::pool(config).await?;
                if config.run_migrations {
                    sqlx::migrate!("./migrations").run(&pool).await?;
                    info!("Database migrations applied");
                }
                Ok(Self::postgres(pool, timeout))
            }
        }
    }

    pub async fn pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.query_timeout_ms))
            .connect(url)
            .await?;

        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(pool)
    }

    pub fn postgres(pool: PgPool, timeout: Duration) -> Stores {
        let profiles: Arc<dyn ResourceBackend<Profile>> = Arc::new(PgBackend::<Profile>::new(pool.clone()));
        let addresses: Arc<dyn ResourceBackend<Address>> = Arc::new(PgBackend::<Address>::new(pool));
        Stores {
            profiles: GuardedStore::new(profiles, timeout),
            addresses: GuardedStore::new(addresses, timeout),
        }
    }

    pub fn memory(timeout: Duration) -> Stores {
        let profiles: Arc<dyn ResourceBackend<Profile>> = Arc::new(MemoryBackend::<Profile>::new());
        let addresses: Arc<dyn ResourceBackend<Address>> = Arc::new(MemoryBackend::<Address>::new());
        Stores {
            profiles: GuardedStore::new(profiles, timeout),
            addresses: GuardedStore::new(addresses, timeout),
        }
    }
}
