//! Embedded schema migrations

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::DomainError;

/// Applies embedded migrations, recording each in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    /// Apply one migration unless it is already recorded. The schema change
    /// and its record commit together.
    pub async fn run_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        self.ensure_migrations_table().await?;

        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)")
                .bind(migration.version)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::storage(format!("Failed to check migration status: {}", e))
                })?;

        if applied {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::transaction(format!("Failed to begin migration: {}", e)))?;

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::transaction(format!("Failed to commit migration: {}", e)))?;

        Ok(true)
    }

    /// Latest applied version
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get migration version: {}", e)))?;

        Ok(version)
    }
}

/// A forward-only schema step
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub up: &'static str,
}

/// Schema for users and their sessions
///
/// Email and username are unique among active rows only, so a soft-deleted
/// account does not block reuse.
pub fn user_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Create users table",
            up: r#"
                CREATE TABLE IF NOT EXISTS users (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    email TEXT NOT NULL,
                    username TEXT NOT NULL,
                    password TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    deleted_at TIMESTAMPTZ
                );
                CREATE UNIQUE INDEX IF NOT EXISTS users_email_active_key
                    ON users (email) WHERE deleted_at IS NULL;
                CREATE UNIQUE INDEX IF NOT EXISTS users_username_active_key
                    ON users (username) WHERE deleted_at IS NULL;
                CREATE INDEX IF NOT EXISTS users_created_at_idx
                    ON users (created_at, id);
            "#,
        },
        Migration {
            version: 2,
            description: "Create sessions table",
            up: r#"
                CREATE TABLE IF NOT EXISTS sessions (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    user_id UUID NOT NULL REFERENCES users (id),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX IF NOT EXISTS sessions_user_id_idx ON sessions (user_id);
            "#,
        },
    ]
}

/// Apply every pending user migration in version order
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    let migrator = PostgresMigrator::new(pool.clone());

    for migration in user_migrations() {
        if migrator.run_migration(&migration).await? {
            info!(
                version = migration.version,
                description = migration.description,
                "migration applied"
            );
        }
    }

    let version = migrator.current_version().await?;
    info!(version = ?version, "schema up to date");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered() {
        let migrations = user_migrations();
        let versions: Vec<_> = migrations.iter().map(|m| m.version).collect();

        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_uniqueness_covers_active_rows_only() {
        let users = user_migrations()[0].up;

        assert!(users.contains("ON users (email) WHERE deleted_at IS NULL"));
        assert!(users.contains("ON users (username) WHERE deleted_at IS NULL"));
        assert!(users.contains("DEFAULT gen_random_uuid()"));
    }

    #[test]
    fn test_sessions_reference_users() {
        let sessions = user_migrations()[1].up;

        assert!(sessions.contains("REFERENCES users (id)"));
    }
}
