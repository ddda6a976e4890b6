//! Rule engine on top of `validator` with table-driven messages

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::domain::user::compile_rules;

/// One rule failure reported by the engine
type RuleFailure = validator::ValidationError;

/// A rejected input record, carrying one message per failed rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation error")]
pub struct ValidationError {
    pub errors: Vec<String>,
}

impl ValidationError {
    /// All messages joined for a single-line response
    pub fn joined(&self) -> String {
        self.errors.join("; ")
    }
}

/// A failed rule on one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub tag: String,
    pub message: String,
}

/// Abstraction over every validator used by the service
pub trait ValidationProvider: Send + Sync {
    /// Run all declared rules; `Err` carries the user-facing messages
    fn validate_data(&self, data: &dyn Validate) -> Result<(), ValidationError>;
}

/// Default `validator`-backed engine
#[derive(Debug, Clone, Copy)]
pub struct Validator;

impl Validator {
    /// Build the engine. Panics if a rule pattern does not compile, which
    /// only happens at start-up.
    pub fn new() -> Self {
        compile_rules();
        debug!("validation rules compiled");
        Self
    }

    /// Every failed rule, empty when the record is valid
    pub fn field_errors(&self, data: &dyn Validate) -> Vec<FieldError> {
        match data.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => collect_field_errors(&errors),
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationProvider for Validator {
    fn validate_data(&self, data: &dyn Validate) -> Result<(), ValidationError> {
        let failures = self.field_errors(data);

        if failures.is_empty() {
            return Ok(());
        }

        Err(ValidationError {
            errors: failures.into_iter().map(|f| f.message).collect(),
        })
    }
}

/// Flatten an engine report into field errors, ordered by field name
pub fn collect_field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let mut collected = Vec::new();

    for (field, kind) in fields {
        match kind {
            ValidationErrorsKind::Field(failures) => {
                let field = field.to_lowercase();

                for failure in failures {
                    collected.push(describe(&field, failure));
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                collected.extend(collect_field_errors(nested));
            }
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    collected.extend(collect_field_errors(nested));
                }
            }
        }
    }

    collected
}

/// Rule tags the message table knows about
#[derive(Debug, Clone, PartialEq)]
enum Rule {
    Required,
    Email,
    Min { limit: String, numeric: bool },
    Max { limit: String, numeric: bool },
    Password,
    Alphanum,
    Alpha,
    Numeric,
    Len(String),
    OneOf(String),
    Datetime,
    Other(String),
}

impl Rule {
    fn tag(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::Email => "email",
            Self::Min { .. } => "min",
            Self::Max { .. } => "max",
            Self::Password => "password",
            Self::Alphanum => "alphanum",
            Self::Alpha => "alpha",
            Self::Numeric => "numeric",
            Self::Len(_) => "len",
            Self::OneOf(_) => "oneof",
            Self::Datetime => "datetime",
            Self::Other(tag) => tag,
        }
    }

    fn message(&self, field: &str) -> String {
        match self {
            Self::Required => format!("field '{}' is required", field),
            Self::Email => "field 'email' must be a valid email address".to_string(),
            Self::Min { limit, numeric: true } => {
                format!("field '{}' must be at least {}", field, limit)
            }
            Self::Min { limit, numeric: false } => {
                format!("field '{}' must be at least {} characters long", field, limit)
            }
            Self::Max { limit, numeric: true } => {
                format!("field '{}' must be at most {}", field, limit)
            }
            Self::Max { limit, numeric: false } => {
                format!("field '{}' must be at most {} characters long", field, limit)
            }
            Self::Password => "field 'password' must be at least 8 characters long and contain at least one uppercase letter, one lowercase letter, one number, and one special character".to_string(),
            Self::Alphanum => {
                format!("field '{}' must contain only alphanumeric characters", field)
            }
            Self::Alpha => format!("field '{}' must contain only alphabetic characters", field),
            Self::Numeric => format!("field '{}' must be a valid number", field),
            Self::Len(exact) => {
                format!("field '{}' must be exactly {} characters long", field, exact)
            }
            Self::OneOf(options) => format!("field '{}' must be one of [{}]", field, options),
            Self::Datetime => format!(
                "field '{}' must be a valid datetime in YYYY-MM-DD format",
                field
            ),
            Self::Other(tag) => format!("field '{}' failed validation for tag '{}'", field, tag),
        }
    }
}

fn describe(field: &str, failure: &RuleFailure) -> FieldError {
    let rule = resolve_rule(failure);

    FieldError {
        field: field.to_string(),
        tag: rule.tag().to_string(),
        message: rule.message(field),
    }
}

fn resolve_rule(failure: &RuleFailure) -> Rule {
    let numeric = matches!(failure.params.get("value"), Some(Value::Number(_)));

    match &*failure.code {
        "required" => Rule::Required,
        "email" => Rule::Email,
        "length" => resolve_length(failure),
        "range" => resolve_range(failure),
        "min" => Rule::Min {
            limit: param(failure, "min"),
            numeric,
        },
        "max" => Rule::Max {
            limit: param(failure, "max"),
            numeric,
        },
        "password" => Rule::Password,
        "alphanum" => Rule::Alphanum,
        "alpha" => Rule::Alpha,
        "numeric" => Rule::Numeric,
        "len" => Rule::Len(param(failure, "len")),
        "oneof" => Rule::OneOf(param(failure, "oneof")),
        "datetime" => Rule::Datetime,
        other => Rule::Other(other.to_string()),
    }
}

/// `length(min, max, equal)` reports one code for every bound; pick the
/// bound the reported value actually broke
fn resolve_length(failure: &RuleFailure) -> Rule {
    if failure.params.contains_key("equal") {
        return Rule::Len(param(failure, "equal"));
    }

    let min = failure.params.get("min").and_then(Value::as_f64);
    let max = failure.params.get("max").and_then(Value::as_f64);
    let length = match failure.params.get("value") {
        Some(Value::String(s)) => Some(s.chars().count() as f64),
        Some(Value::Array(items)) => Some(items.len() as f64),
        _ => None,
    };

    pick_bound(failure, min, max, length, false)
}

fn resolve_range(failure: &RuleFailure) -> Rule {
    let min = failure.params.get("min").and_then(Value::as_f64);
    let max = failure.params.get("max").and_then(Value::as_f64);
    let value = failure.params.get("value").and_then(Value::as_f64);

    pick_bound(failure, min, max, value, true)
}

fn pick_bound(
    failure: &RuleFailure,
    min: Option<f64>,
    max: Option<f64>,
    value: Option<f64>,
    numeric: bool,
) -> Rule {
    let below_min = matches!((min, value), (Some(m), Some(v)) if v < m);
    let above_max = matches!((max, value), (Some(m), Some(v)) if v > m);

    if below_min || (!above_max && min.is_some()) {
        Rule::Min {
            limit: param(failure, "min"),
            numeric,
        }
    } else {
        Rule::Max {
            limit: param(failure, "max"),
            numeric,
        }
    }
}

fn param(failure: &RuleFailure, name: &str) -> String {
    match failure.params.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::{validate_strong_password, NewUserInput, PasswordInput};
    use std::borrow::Cow;

    #[derive(Debug, Validate)]
    struct Signup {
        #[validate(length(min = 3))]
        name: String,
        #[validate(email)]
        email: String,
        #[validate(custom(function = "validate_strong_password"))]
        password: String,
    }

    #[derive(Debug, Validate)]
    struct Profile {
        #[validate(range(min = 18, max = 130))]
        age: u32,
        #[validate(length(max = 5))]
        nickname: String,
        #[validate(length(equal = 2))]
        country: String,
    }

    fn failure(code: &'static str, params: &[(&'static str, Value)]) -> RuleFailure {
        let mut failure = RuleFailure::new(code);
        for (name, value) in params {
            failure.add_param(Cow::from(*name), value);
        }
        failure
    }

    fn messages_for(field: &'static str, failure: RuleFailure) -> Vec<String> {
        let mut errors = ValidationErrors::new();
        errors.add(field, failure);
        collect_field_errors(&errors)
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_valid_record_has_no_errors() {
        let validator = Validator::new();
        let data = Signup {
            name: "Testing name".to_string(),
            email: "testing@testing.com".to_string(),
            password: "Testing123@123".to_string(),
        };

        assert!(validator.field_errors(&data).is_empty());
        assert!(validator.validate_data(&data).is_ok());
    }

    #[test]
    fn test_invalid_record_reports_every_field() {
        let validator = Validator::new();
        let data = Signup {
            name: "T".to_string(),
            email: "testing".to_string(),
            password: "test".to_string(),
        };

        let errors = validator.field_errors(&data);

        assert_eq!(
            errors,
            vec![
                FieldError {
                    field: "email".to_string(),
                    tag: "email".to_string(),
                    message: "field 'email' must be a valid email address".to_string(),
                },
                FieldError {
                    field: "name".to_string(),
                    tag: "min".to_string(),
                    message: "field 'name' must be at least 3 characters long".to_string(),
                },
                FieldError {
                    field: "password".to_string(),
                    tag: "password".to_string(),
                    message: "field 'password' must be at least 8 characters long and contain at least one uppercase letter, one lowercase letter, one number, and one special character".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_validate_data_wraps_messages() {
        let validator = Validator::new();
        let err = validator
            .validate_data(&PasswordInput::new(""))
            .unwrap_err();

        assert_eq!(err.errors, vec!["field 'password' is required".to_string()]);
        assert_eq!(err.joined(), "field 'password' is required");
    }

    #[test]
    fn test_default_engine_is_shared_by_copy() {
        let validator = Validator::default();
        let copy = validator;

        assert!(validator.validate_data(&PasswordInput::new("Testing123@")).is_ok());
        assert!(copy.validate_data(&PasswordInput::new("weak")).is_err());
    }

    #[test]
    fn test_new_user_username_bounds() {
        let validator = Validator::new();

        let short = validator.field_errors(&NewUserInput::new("a@b.co", "ab", "Testing123@"));
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].message, "field 'username' must be at least 3 characters long");

        let long_name = "a".repeat(51);
        let long = validator.field_errors(&NewUserInput::new("a@b.co", &long_name, "Testing123@"));
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].message, "field 'username' must be at most 50 characters long");
    }

    #[test]
    fn test_numeric_and_exact_bounds() {
        let validator = Validator::new();
        let data = Profile {
            age: 12,
            nickname: "abcdefg".to_string(),
            country: "BRA".to_string(),
        };

        let messages: Vec<_> = validator
            .field_errors(&data)
            .into_iter()
            .map(|e| e.message)
            .collect();

        assert_eq!(
            messages,
            vec![
                "field 'age' must be at least 18".to_string(),
                "field 'country' must be exactly 2 characters long".to_string(),
                "field 'nickname' must be at most 5 characters long".to_string(),
            ]
        );

        let too_old = Profile {
            age: 200,
            nickname: "abc".to_string(),
            country: "BR".to_string(),
        };
        let errors = validator.field_errors(&too_old);
        assert_eq!(errors[0].message, "field 'age' must be at most 130");
    }

    #[test]
    fn test_message_table_for_tag_codes() {
        let cases = [
            (
                failure("required", &[]),
                "field 'code' is required",
            ),
            (
                failure("min", &[("min", Value::from(3)), ("value", Value::from(1))]),
                "field 'code' must be at least 3",
            ),
            (
                failure("min", &[("min", Value::from(3)), ("value", Value::from("a"))]),
                "field 'code' must be at least 3 characters long",
            ),
            (
                failure("max", &[("max", Value::from(9)), ("value", Value::from(10))]),
                "field 'code' must be at most 9",
            ),
            (
                failure("max", &[("max", Value::from(9)), ("value", Value::from("abcdefghij"))]),
                "field 'code' must be at most 9 characters long",
            ),
            (
                failure("alphanum", &[]),
                "field 'code' must contain only alphanumeric characters",
            ),
            (
                failure("alpha", &[]),
                "field 'code' must contain only alphabetic characters",
            ),
            (failure("numeric", &[]), "field 'code' must be a valid number"),
            (
                failure("len", &[("len", Value::from(4))]),
                "field 'code' must be exactly 4 characters long",
            ),
            (
                failure("oneof", &[("oneof", Value::from("red green"))]),
                "field 'code' must be one of [red green]",
            ),
            (
                failure("datetime", &[]),
                "field 'code' must be a valid datetime in YYYY-MM-DD format",
            ),
            (
                failure("uuid", &[]),
                "field 'code' failed validation for tag 'uuid'",
            ),
        ];

        for (rule, expected) in cases {
            assert_eq!(messages_for("code", rule), vec![expected.to_string()]);
        }
    }

    #[test]
    fn test_field_names_are_lowercased() {
        let mut errors = ValidationErrors::new();
        errors.add("UserName", failure("required", &[]));

        let collected = collect_field_errors(&errors);
        assert_eq!(collected[0].field, "username");
        assert_eq!(collected[0].tag, "required");
    }
}
