//! User infrastructure module
//!
//! Password hashing, the PostgreSQL and in-memory repositories, and the
//! service that fronts them.

mod password;
mod postgres_repository;
mod repository;
mod service;

pub use password::{Argon2Hasher, PasswordHasher};
pub use postgres_repository::PostgresUserRepository;
pub use repository::InMemoryUserRepository;
pub use service::{
    clamp_limit, clamp_offset, BatchGetUsersRequest, CreateUserRequest, DeleteUserRequest,
    GetUserRequest, ListUsersRequest, ListUsersResponse, ServiceError, UpdatePasswordRequest,
    UserResponse, UserService, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};
