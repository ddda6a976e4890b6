//! PostgreSQL user repository implementation

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::user::{
    DeleteUserParams, InsertUserParams, ListUsersParams, LookupByEmailParams, LookupByIdParams,
    LookupByIdsParams, LookupByUsernameParams, UpdatePasswordParams, User, UsersRepository,
};
use crate::domain::DomainError;
use crate::infrastructure::database::ConnectionProvider;

const USER_COLUMNS: &str = "id, email, username, password, created_at, updated_at, deleted_at";

/// PostgreSQL implementation of `UsersRepository`
///
/// Every call acquires the pool through the provider, so each operation
/// runs against a health-checked handle.
#[derive(Clone)]
pub struct PostgresUserRepository {
    provider: Arc<dyn ConnectionProvider>,
}

impl PostgresUserRepository {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    async fn pool(&self) -> Result<PgPool, DomainError> {
        self.provider.acquire().await.inspect_err(|e| {
            error!(layer = "repository", driver = "psql", error = %e, "failed to acquire connection");
        })
    }

    async fn fetch_one_user(
        &self,
        sql: &str,
        bind: Lookup<'_>,
        what: &str,
    ) -> Result<Option<User>, DomainError> {
        let pool = self.pool().await?;

        let query = sqlx::query(sql);
        let query = match bind {
            Lookup::Text(value) => query.bind(value),
            Lookup::Id(id) => query.bind(id),
        };

        let row = query
            .fetch_optional(&pool)
            .await
            .map_err(|e| log_store_error(map_sqlx_error(e, what)))?;

        match row {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => {
                warn!(layer = "repository", driver = "psql", "{}: no user found", what);
                Ok(None)
            }
        }
    }
}

enum Lookup<'a> {
    Text(&'a str),
    Id(Uuid),
}

#[async_trait]
impl UsersRepository for PostgresUserRepository {
    async fn lookup_by_email(
        &self,
        params: LookupByEmailParams,
    ) -> Result<Option<User>, DomainError> {
        info!(layer = "repository", driver = "psql", "looking up user by email");

        let sql = select_where("email = $1", params.include_deleted);
        self.fetch_one_user(&sql, Lookup::Text(&params.email), "lookup by email")
            .await
    }

    async fn lookup_by_username(
        &self,
        params: LookupByUsernameParams,
    ) -> Result<Option<User>, DomainError> {
        info!(layer = "repository", driver = "psql", "looking up user by username");

        let sql = select_where("username = $1", params.include_deleted);
        self.fetch_one_user(&sql, Lookup::Text(&params.username), "lookup by username")
            .await
    }

    async fn lookup_by_id(&self, params: LookupByIdParams) -> Result<Option<User>, DomainError> {
        info!(layer = "repository", driver = "psql", user_id = %params.id, "looking up user by id");

        let sql = select_where("id = $1", params.include_deleted);
        self.fetch_one_user(&sql, Lookup::Id(params.id), "lookup by id")
            .await
    }

    async fn lookup_by_ids(&self, params: LookupByIdsParams) -> Result<Vec<User>, DomainError> {
        if params.ids.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            layer = "repository",
            driver = "psql",
            count = params.ids.len(),
            "looking up users by id set"
        );

        let pool = self.pool().await?;
        let sql = format!(
            "{} ORDER BY created_at, id",
            select_where("id = ANY($1)", params.include_deleted)
        );

        let rows = sqlx::query(&sql)
            .bind(&params.ids)
            .fetch_all(&pool)
            .await
            .map_err(|e| log_store_error(map_sqlx_error(e, "lookup by ids")))?;

        rows.iter().map(row_to_user).collect()
    }

    async fn list(&self, params: ListUsersParams) -> Result<Vec<User>, DomainError> {
        info!(
            layer = "repository",
            driver = "psql",
            limit = params.limit,
            offset = params.offset,
            "listing users"
        );

        let pool = self.pool().await?;
        let sql = format!(
            "{} ORDER BY created_at, id LIMIT $1 OFFSET $2",
            select_where("TRUE", params.include_deleted)
        );

        let rows = sqlx::query(&sql)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&pool)
            .await
            .map_err(|e| log_store_error(map_sqlx_error(e, "list users")))?;

        rows.iter().map(row_to_user).collect()
    }

    async fn insert(&self, params: InsertUserParams) -> Result<User, DomainError> {
        info!(layer = "repository", driver = "psql", "inserting user");

        let pool = self.pool().await?;
        let sql = format!(
            "INSERT INTO users (email, username, password) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(&params.email)
            .bind(&params.username)
            .bind(&params.password_hash)
            .fetch_one(&pool)
            .await
            .map_err(|e| log_store_error(map_sqlx_error(e, "insert user")))?;

        row_to_user(&row)
    }

    async fn update_password(&self, params: UpdatePasswordParams) -> Result<User, DomainError> {
        info!(layer = "repository", driver = "psql", user_id = %params.user_id, "updating password");

        let pool = self.pool().await?;
        let sql = format!(
            "UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(&params.password_hash)
            .bind(params.user_id)
            .fetch_one(&pool)
            .await
            .map_err(|e| log_store_error(map_sqlx_error(e, "update password")))?;

        row_to_user(&row)
    }

    async fn delete(&self, params: DeleteUserParams) -> Result<(), DomainError> {
        info!(
            layer = "repository",
            driver = "psql",
            user_id = %params.id,
            hard = params.hard,
            "deleting user"
        );

        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(|e| {
            error!(layer = "repository", driver = "psql", error = %e, "failed to begin transaction");
            DomainError::transaction(format!("failed to begin transaction: {}", e))
        })?;

        if let Err(e) = apply_delete(&mut *tx, &params).await {
            error!(layer = "repository", driver = "psql", error = %e, "delete failed, rolling back");

            if let Err(rollback) = tx.rollback().await {
                error!(layer = "repository", driver = "psql", error = %rollback, "rollback failed");
            }

            return Err(DomainError::transaction(format!("failed to delete user: {}", e)));
        }

        tx.commit().await.map_err(|e| {
            error!(layer = "repository", driver = "psql", error = %e, "commit failed");
            DomainError::transaction(format!("failed to commit transaction: {}", e))
        })
    }
}

/// Statements of a delete, run on an open transaction
async fn apply_delete(conn: &mut PgConnection, params: &DeleteUserParams) -> Result<(), sqlx::Error> {
    if params.hard {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(params.id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(params.id)
            .execute(&mut *conn)
            .await?;
    } else {
        sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(params.id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

fn select_where(condition: &str, include_deleted: bool) -> String {
    let mut sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);

    if !include_deleted {
        sql.push_str(" AND deleted_at IS NULL");
    }

    sql
}

fn map_sqlx_error(e: sqlx::Error, what: &str) -> DomainError {
    match e {
        sqlx::Error::RowNotFound => DomainError::not_found(format!("{}: no rows returned", what)),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DomainError::conflict(db.constraint().unwrap_or("unique constraint").to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DomainError::connection(format!("{}: {}", what, e))
        }
        e => DomainError::storage(format!("{}: {}", what, e)),
    }
}

fn log_store_error(e: DomainError) -> DomainError {
    if !e.is_conflict() {
        error!(layer = "repository", driver = "psql", error = %e, "store error");
    }
    e
}

fn row_to_user(row: &PgRow) -> Result<User, DomainError> {
    let column = |e: sqlx::Error| DomainError::storage(format!("Failed to decode user row: {}", e));

    let id: Uuid = row.try_get("id").map_err(column)?;
    let email: String = row.try_get("email").map_err(column)?;
    let username: String = row.try_get("username").map_err(column)?;
    let password_hash: String = row.try_get("password").map_err(column)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(column)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(column)?;
    let deleted_at: Option<DateTime<Utc>> = row.try_get("deleted_at").map_err(column)?;

    Ok(User::from_row(
        id,
        email,
        username,
        password_hash,
        created_at,
        updated_at,
        deleted_at,
    ))
}
