//! Infrastructure layer - Database, validation and service implementations

pub mod database;
pub mod logging;
pub mod user;
pub mod validation;
