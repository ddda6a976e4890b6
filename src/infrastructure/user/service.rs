//! User service: validation, repository calls and response mapping

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::domain::user::{
    DeleteUserParams, EmailInput, InsertUserParams, ListUsersParams, LookupByEmailParams,
    LookupByIdParams, LookupByIdsParams, LookupByUsernameParams, NewUserInput, PasswordInput,
    UpdatePasswordParams, User, UsernameInput, UsersRepository,
};
use crate::domain::DomainError;
use crate::infrastructure::validation::{ValidationError, ValidationProvider, Validator};

use super::password::PasswordHasher;

/// Page size used when the caller asks for none
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Largest page a caller can ask for
pub const MAX_LIST_LIMIT: i64 = 100;

/// Failure categories surfaced to callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    /// Details are logged, never returned
    #[error("internal server error")]
    Internal,
}

/// Request for creating a new user
#[derive(Clone, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Key used to fetch a single user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetUserRequest {
    Id(String),
    Email(String),
    Username(String),
}

/// Request for fetching several users by ID
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchGetUsersRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Pagination window as sent by the caller, before clamping
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListUsersRequest {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Request for replacing a user's password
#[derive(Clone)]
pub struct UpdatePasswordRequest {
    pub id: String,
    pub password: String,
}

/// Request for deleting a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteUserRequest {
    pub id: String,
    pub hard: bool,
}

/// Public projection of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            email: user.email().to_string(),
            username: user.username().to_string(),
            created_at: user.created_at().to_rfc3339_opts(SecondsFormat::Secs, true),
            updated_at: user.updated_at().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// A page of users with the window actually applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
    pub limit: i64,
    pub offset: i64,
}

/// `<= 0` means "unspecified"; anything above the ceiling is capped
pub fn clamp_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_LIST_LIMIT
    } else {
        limit.min(MAX_LIST_LIMIT)
    }
}

pub fn clamp_offset(offset: i64) -> i64 {
    offset.max(0)
}

/// Request handler for user accounts
pub struct UserService<R: UsersRepository, H: PasswordHasher> {
    repository: Arc<R>,
    hasher: Arc<H>,
    validator: Validator,
    request_timeout: Duration,
}

impl<R, H> UserService<R, H>
where
    R: UsersRepository,
    H: PasswordHasher + 'static,
{
    pub fn new(repository: Arc<R>, hasher: Arc<H>, request_timeout: Duration) -> Self {
        Self {
            repository,
            hasher,
            validator: Validator::new(),
            request_timeout,
        }
    }

    /// Create a new user
    ///
    /// The email check runs before the username check, so a request
    /// clashing on both reports the email.
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserResponse, ServiceError> {
        self.bounded("create_user", self.create_user_inner(request))
            .await
    }

    async fn create_user_inner(
        &self,
        request: CreateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        info!(email = %request.email, username = %request.username, "received request to create user");

        self.validate(&NewUserInput::new(
            &request.email,
            &request.username,
            &request.password,
        ))?;

        let existing = self
            .repository
            .lookup_by_email(LookupByEmailParams {
                email: request.email.clone(),
                include_deleted: false,
            })
            .await
            .map_err(|e| internal("create_user", e))?;

        if existing.is_some() {
            warn!(email = %request.email, "email already registered");
            return Err(email_taken(&request.email));
        }

        let existing = self
            .repository
            .lookup_by_username(LookupByUsernameParams {
                username: request.username.clone(),
                include_deleted: false,
            })
            .await
            .map_err(|e| internal("create_user", e))?;

        if existing.is_some() {
            warn!(username = %request.username, "username already registered");
            return Err(username_taken(&request.username));
        }

        let password_hash = self.hash_password(request.password).await?;

        let user = self
            .repository
            .insert(InsertUserParams {
                email: request.email.clone(),
                username: request.username.clone(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                DomainError::Conflict { message } if message.contains("username") => {
                    username_taken(&request.username)
                }
                DomainError::Conflict { .. } => email_taken(&request.email),
                e => internal("create_user", e),
            })?;

        info!(user_id = %user.id(), email = %user.email(), "user created");

        Ok(UserResponse::from(&user))
    }

    /// Fetch one active user by ID, email or username
    pub async fn get_user(&self, request: GetUserRequest) -> Result<UserResponse, ServiceError> {
        self.bounded("get_user", self.get_user_inner(request)).await
    }

    async fn get_user_inner(&self, request: GetUserRequest) -> Result<UserResponse, ServiceError> {
        info!(request = ?request, "received request to get user");

        let user = match request {
            GetUserRequest::Id(id) => {
                let id = parse_id(&id)?;
                self.repository
                    .lookup_by_id(LookupByIdParams {
                        id,
                        include_deleted: false,
                    })
                    .await
            }
            GetUserRequest::Email(email) => {
                self.validate(&EmailInput::new(&email))?;
                self.repository
                    .lookup_by_email(LookupByEmailParams {
                        email,
                        include_deleted: false,
                    })
                    .await
            }
            GetUserRequest::Username(username) => {
                self.validate(&UsernameInput::new(&username))?;
                self.repository
                    .lookup_by_username(LookupByUsernameParams {
                        username,
                        include_deleted: false,
                    })
                    .await
            }
        }
        .map_err(|e| internal("get_user", e))?
        .ok_or_else(user_not_found)?;

        Ok(UserResponse::from(&user))
    }

    /// Fetch every active user in the ID set; unknown IDs are skipped
    pub async fn get_users(
        &self,
        request: BatchGetUsersRequest,
    ) -> Result<Vec<UserResponse>, ServiceError> {
        self.bounded("get_users", self.get_users_inner(request))
            .await
    }

    async fn get_users_inner(
        &self,
        request: BatchGetUsersRequest,
    ) -> Result<Vec<UserResponse>, ServiceError> {
        info!(count = request.ids.len(), "received request to get users");

        let ids = request
            .ids
            .iter()
            .map(|id| parse_id(id))
            .collect::<Result<Vec<_>, _>>()?;

        let users = self
            .repository
            .lookup_by_ids(LookupByIdsParams {
                ids,
                include_deleted: false,
            })
            .await
            .map_err(|e| internal("get_users", e))?;

        Ok(users.iter().map(UserResponse::from).collect())
    }

    /// List a page of active users
    pub async fn list_users(
        &self,
        request: ListUsersRequest,
    ) -> Result<ListUsersResponse, ServiceError> {
        self.bounded("list_users", self.list_users_inner(request))
            .await
    }

    async fn list_users_inner(
        &self,
        request: ListUsersRequest,
    ) -> Result<ListUsersResponse, ServiceError> {
        info!(limit = request.limit, offset = request.offset, "received request to list users");

        let limit = clamp_limit(request.limit);
        let offset = clamp_offset(request.offset);

        let users = self
            .repository
            .list(ListUsersParams {
                limit,
                offset,
                include_deleted: false,
            })
            .await
            .map_err(|e| internal("list_users", e))?;

        info!(count = users.len(), limit, offset, "users retrieved");

        Ok(ListUsersResponse {
            users: users.iter().map(UserResponse::from).collect(),
            limit,
            offset,
        })
    }

    /// Replace the password of an active user
    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<UserResponse, ServiceError> {
        self.bounded("update_password", self.update_password_inner(request))
            .await
    }

    async fn update_password_inner(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<UserResponse, ServiceError> {
        info!(user_id = %request.id, "received request to update password");

        let id = parse_id(&request.id)?;
        self.validate(&PasswordInput::new(&request.password))?;

        self.repository
            .lookup_by_id(LookupByIdParams {
                id,
                include_deleted: false,
            })
            .await
            .map_err(|e| internal("update_password", e))?
            .ok_or_else(user_not_found)?;

        let password_hash = self.hash_password(request.password).await?;

        let user = self
            .repository
            .update_password(UpdatePasswordParams {
                user_id: id,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                DomainError::NotFound { .. } => user_not_found(),
                e => internal("update_password", e),
            })?;

        info!(user_id = %user.id(), "password updated");

        Ok(UserResponse::from(&user))
    }

    /// Soft or hard delete. Deleting an unknown ID succeeds.
    pub async fn delete_user(&self, request: DeleteUserRequest) -> Result<(), ServiceError> {
        self.bounded("delete_user", self.delete_user_inner(request))
            .await
    }

    async fn delete_user_inner(&self, request: DeleteUserRequest) -> Result<(), ServiceError> {
        info!(user_id = %request.id, hard = request.hard, "received request to delete user");

        let id = parse_id(&request.id)?;

        self.repository
            .delete(DeleteUserParams {
                id,
                hard: request.hard,
            })
            .await
            .map_err(|e| internal("delete_user", e))?;

        info!(user_id = %id, hard = request.hard, "user deleted");

        Ok(())
    }

    fn validate(&self, input: &dyn Validate) -> Result<(), ServiceError> {
        self.validator.validate_data(input).map_err(|e| {
            warn!(errors = ?e.errors, "validation failed");
            invalid_input(e)
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, ServiceError> {
        let hasher = Arc::clone(&self.hasher);

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                error!(error = %e, "password hashing task failed");
                ServiceError::Internal
            })?
            .map_err(|e| internal("hash_password", e))
    }

    /// Run an operation under the request timeout. Expiry drops the
    /// in-flight future, which aborts the statement and rolls back any open
    /// transaction.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.request_timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    operation,
                    timeout_secs = self.request_timeout.as_secs(),
                    "request timed out"
                );
                Err(ServiceError::Internal)
            }
        }
    }
}

fn parse_id(id: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(id).map_err(|e| {
        warn!(id = %id, error = %e, "invalid user ID format");
        ServiceError::InvalidInput("invalid user ID format".to_string())
    })
}

fn invalid_input(e: ValidationError) -> ServiceError {
    ServiceError::InvalidInput(format!("validation failed: {}", e.joined()))
}

fn internal(operation: &'static str, e: DomainError) -> ServiceError {
    error!(operation, error = %e, "store error");
    ServiceError::Internal
}

fn user_not_found() -> ServiceError {
    ServiceError::NotFound("user not found".to_string())
}

fn email_taken(email: &str) -> ServiceError {
    ServiceError::AlreadyExists(format!("user with email {} already exists", email))
}

fn username_taken(username: &str) -> ServiceError {
    ServiceError::AlreadyExists(format!("user with username {} already exists", username))
}
