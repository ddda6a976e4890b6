//! User repository trait

use async_trait::async_trait;
use uuid::Uuid;

use super::entity::User;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupByEmailParams {
    pub email: String,
    pub include_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupByUsernameParams {
    pub username: String,
    pub include_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupByIdParams {
    pub id: Uuid,
    pub include_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupByIdsParams {
    pub ids: Vec<Uuid>,
    pub include_deleted: bool,
}

/// Pagination window; callers clamp before reaching the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsersParams {
    pub limit: i64,
    pub offset: i64,
    pub include_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertUserParams {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePasswordParams {
    pub user_id: Uuid,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteUserParams {
    pub id: Uuid,
    pub hard: bool,
}

/// Repository trait for user storage
///
/// Lookups signal "no rows" with `Ok(None)`. Only the repository mutates
/// persisted user state.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Find a user by email
    async fn lookup_by_email(
        &self,
        params: LookupByEmailParams,
    ) -> Result<Option<User>, DomainError>;

    /// Find a user by username
    async fn lookup_by_username(
        &self,
        params: LookupByUsernameParams,
    ) -> Result<Option<User>, DomainError>;

    /// Find a user by ID
    async fn lookup_by_id(&self, params: LookupByIdParams) -> Result<Option<User>, DomainError>;

    /// Find every user whose ID is in the set; an empty set yields an empty list
    async fn lookup_by_ids(&self, params: LookupByIdsParams) -> Result<Vec<User>, DomainError>;

    /// List a page of users
    async fn list(&self, params: ListUsersParams) -> Result<Vec<User>, DomainError>;

    /// Insert a user; the store assigns ID and timestamps
    async fn insert(&self, params: InsertUserParams) -> Result<User, DomainError>;

    /// Replace a user's password hash and bump `updated_at`
    async fn update_password(&self, params: UpdatePasswordParams) -> Result<User, DomainError>;

    /// Soft or hard delete inside a single transaction
    async fn delete(&self, params: DeleteUserParams) -> Result<(), DomainError>;
}
