//! User accounts service
//!
//! Create, fetch, list, re-password and delete user records over HTTP/JSON,
//! backed by PostgreSQL with soft-delete semantics.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use infrastructure::database::{run_migrations, ConnectionProvider, PostgresProvider};
use infrastructure::user::{
    Argon2Hasher, InMemoryUserRepository, PostgresUserRepository, UserService,
};
use tracing::info;

/// Wire the PostgreSQL-backed service
///
/// The pool opens lazily on the first request unless migrations run at
/// start-up.
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let provider: Arc<dyn ConnectionProvider> = Arc::new(PostgresProvider::new(&config.database)?);

    if config.database.run_migrations {
        info!("Applying database migrations");
        let pool = provider.acquire().await?;
        run_migrations(&pool).await?;
    }

    let repository = Arc::new(PostgresUserRepository::new(Arc::clone(&provider)));
    let service = UserService::new(
        repository,
        Arc::new(Argon2Hasher::new()),
        request_timeout(config),
    );

    Ok(AppState {
        user_service: Arc::new(service),
        connection_provider: Some(provider),
    })
}

/// Wire the service against the in-memory store; nothing survives a restart
pub fn create_in_memory_app_state(config: &AppConfig) -> AppState {
    let service = UserService::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(Argon2Hasher::new()),
        request_timeout(config),
    );

    AppState {
        user_service: Arc::new(service),
        connection_provider: None,
    }
}

fn request_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.service.request_timeout_secs)
}
