//! Application state for shared services

use std::sync::Arc;

use crate::domain::user::UsersRepository;
use crate::infrastructure::database::ConnectionProvider;
use crate::infrastructure::user::{
    BatchGetUsersRequest, CreateUserRequest, DeleteUserRequest, GetUserRequest, ListUsersRequest,
    ListUsersResponse, PasswordHasher, ServiceError, UpdatePasswordRequest, UserResponse,
    UserService,
};

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<dyn UserServiceTrait>,
    /// `None` when running without a database (in-memory store)
    pub connection_provider: Option<Arc<dyn ConnectionProvider>>,
}

/// Trait for user service operations
#[async_trait::async_trait]
pub trait UserServiceTrait: Send + Sync {
    async fn create_user(&self, request: CreateUserRequest) -> Result<UserResponse, ServiceError>;
    async fn get_user(&self, request: GetUserRequest) -> Result<UserResponse, ServiceError>;
    async fn get_users(
        &self,
        request: BatchGetUsersRequest,
    ) -> Result<Vec<UserResponse>, ServiceError>;
    async fn list_users(&self, request: ListUsersRequest)
        -> Result<ListUsersResponse, ServiceError>;
    async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<UserResponse, ServiceError>;
    async fn delete_user(&self, request: DeleteUserRequest) -> Result<(), ServiceError>;
}

#[async_trait::async_trait]
impl<R, H> UserServiceTrait for UserService<R, H>
where
    R: UsersRepository + 'static,
    H: PasswordHasher + 'static,
{
    async fn create_user(&self, request: CreateUserRequest) -> Result<UserResponse, ServiceError> {
        UserService::create_user(self, request).await
    }

    async fn get_user(&self, request: GetUserRequest) -> Result<UserResponse, ServiceError> {
        UserService::get_user(self, request).await
    }

    async fn get_users(
        &self,
        request: BatchGetUsersRequest,
    ) -> Result<Vec<UserResponse>, ServiceError> {
        UserService::get_users(self, request).await
    }

    async fn list_users(
        &self,
        request: ListUsersRequest,
    ) -> Result<ListUsersResponse, ServiceError> {
        UserService::list_users(self, request).await
    }

    async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<UserResponse, ServiceError> {
        UserService::update_password(self, request).await
    }

    async fn delete_user(&self, request: DeleteUserRequest) -> Result<(), ServiceError> {
        UserService::delete_user(self, request).await
    }
}
