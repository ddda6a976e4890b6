//! Validation engine

mod engine;

pub use engine::{collect_field_errors, FieldError, ValidationError, ValidationProvider, Validator};
