//! Lazily established, health-checked PostgreSQL pool

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::Connection;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::domain::DomainError;

/// Pool ceiling; bursts may open this many before callers queue
pub const MAX_CONNECTIONS: u32 = 50;

/// Idle connections are reaped after this, so quiet periods shrink the pool
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Connections older than this are recycled
pub const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Source of pooled database handles
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Return a live pool, establishing it on first use
    async fn acquire(&self) -> Result<PgPool, DomainError>;

    /// Close the cached pool, if any
    async fn close(&self) -> Result<(), DomainError>;
}

/// PostgreSQL provider
///
/// The first `acquire` opens the pool while holding the lock, so concurrent
/// first callers share one pool. Later calls ping the cached pool. A ping
/// that cannot get a connection in time means the pool is busy and it is
/// kept; any other ping failure closes and forgets it, so the next call
/// starts over.
pub struct PostgresProvider {
    options: PgConnectOptions,
    acquire_timeout: Duration,
    pool: Mutex<Option<PgPool>>,
}

impl std::fmt::Debug for PostgresProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresProvider")
            .field("host", &self.options.get_host())
            .field("database", &self.options.get_database())
            .finish()
    }
}

impl PostgresProvider {
    pub fn new(config: &DatabaseConfig) -> Result<Self, DomainError> {
        let ssl_mode = PgSslMode::from_str(&config.sslmode).map_err(|e| {
            DomainError::connection(format!("invalid sslmode '{}': {}", config.sslmode, e))
        })?;

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .ssl_mode(ssl_mode);

        Ok(Self {
            options,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
            pool: Mutex::new(None),
        })
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .idle_timeout(IDLE_TIMEOUT)
            .max_lifetime(MAX_CONNECTION_LIFETIME)
            .acquire_timeout(self.acquire_timeout)
    }

    async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
        let mut conn = pool.acquire().await?;
        conn.ping().await
    }
}

#[async_trait]
impl ConnectionProvider for PostgresProvider {
    async fn acquire(&self) -> Result<PgPool, DomainError> {
        let pool = {
            let mut cached = self.pool.lock().await;

            match cached.as_ref() {
                Some(pool) => pool.clone(),
                None => {
                    let pool = self
                        .pool_options()
                        .connect_with(self.options.clone())
                        .await
                        .map_err(|e| {
                            error!(error = %e, "failed to open database connection");
                            DomainError::connection(format!("failed to open database: {}", e))
                        })?;

                    info!(
                        host = %self.options.get_host(),
                        max_connections = MAX_CONNECTIONS,
                        "database connection established"
                    );

                    *cached = Some(pool.clone());
                    return Ok(pool);
                }
            }
        };

        if let Err(e) = Self::ping(&pool).await {
            if is_busy(&e) {
                warn!(error = %e, "database pool saturated, keeping it");
                return Err(DomainError::connection(format!("database busy: {}", e)));
            }

            error!(error = %e, "database ping failed");
            pool.close().await;

            // Another caller may already have replaced the pool
            let mut cached = self.pool.lock().await;
            if cached.as_ref().is_some_and(|p| p.is_closed()) {
                *cached = None;
            }

            return Err(DomainError::connection(format!("database ping failed: {}", e)));
        }

        Ok(pool)
    }

    async fn close(&self) -> Result<(), DomainError> {
        let pool = self.pool.lock().await.take();

        if let Some(pool) = pool {
            pool.close().await;
            info!("database connection closed");
        }

        Ok(())
    }
}

/// Pool exhaustion, as opposed to a broken server or connection
fn is_busy(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::PoolTimedOut)
}
