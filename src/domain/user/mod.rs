//! User domain
//!
//! This module provides the user entity, the declarative input rules and the
//! repository trait every backing store implements.

mod entity;
mod repository;
mod validation;

pub use entity::User;
pub use repository::{
    DeleteUserParams, InsertUserParams, ListUsersParams, LookupByEmailParams, LookupByIdParams,
    LookupByIdsParams, LookupByUsernameParams, UpdatePasswordParams, UsersRepository,
};
pub use validation::{
    compile_rules, is_strong_password, validate_strong_password, EmailInput, NewUserInput,
    PasswordInput, UsernameInput, MIN_PASSWORD_LENGTH,
};

#[cfg(test)]
pub use repository::MockUsersRepository;
