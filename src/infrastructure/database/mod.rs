//! PostgreSQL connectivity and schema

pub mod migrations;
mod provider;

pub use migrations::{run_migrations, user_migrations, Migration, PostgresMigrator};
pub use provider::{
    ConnectionProvider, PostgresProvider, IDLE_TIMEOUT, MAX_CONNECTIONS,
    MAX_CONNECTION_LIFETIME,
};
