use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::Config;
use crate::error::{HunterError, Result};

/// Sweeps and fleet syncs give up on a connection after this long
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared PostgreSQL pool for the repositories and the change listener
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect, failing fast when `DATABASE_URL` is absent or unreachable
    pub async fn new(config: &Config) -> Result<Self> {
        let url = config.database_url()?;
        let settings = &config.database;

        info!(
            min = settings.min_connections,
            max = settings.max_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| HunterError::DatabaseConnection(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// `SELECT 1` round-trip time
    pub async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(started.elapsed())
    }

    /// Bring the schema up to the latest version
    pub async fn run_migrations(&self) -> Result<()> {
        super::migrations::run_migrations(&self.pool).await
    }
}
