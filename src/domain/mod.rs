//! Domain layer - Core entities, rules and repository traits

pub mod error;
pub mod user;

pub use error::DomainError;
