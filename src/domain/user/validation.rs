//! Declarative field rules for user input

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationError};

pub const MIN_PASSWORD_LENGTH: usize = 8;

static ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("alphanumeric pattern"));

static HAS_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").expect("symbol pattern"));
static HAS_UPPERCASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]").expect("uppercase pattern"));
static HAS_LOWERCASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z]").expect("lowercase pattern"));
static HAS_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]").expect("digit pattern"));

/// Compile every rule pattern up front so a broken pattern fails at start-up
pub fn compile_rules() {
    Lazy::force(&ALPHANUMERIC);
    Lazy::force(&HAS_SYMBOL);
    Lazy::force(&HAS_UPPERCASE);
    Lazy::force(&HAS_LOWERCASE);
    Lazy::force(&HAS_DIGIT);
}

/// Strong password: at least 8 bytes with a symbol, an uppercase letter,
/// a lowercase letter and a digit. All four classes are required.
pub fn is_strong_password(password: &str) -> bool {
    if password.len() < MIN_PASSWORD_LENGTH {
        return false;
    }

    HAS_SYMBOL.is_match(password)
        && HAS_UPPERCASE.is_match(password)
        && HAS_LOWERCASE.is_match(password)
        && HAS_DIGIT.is_match(password)
}

/// `custom` rule backing the `password` tag
pub fn validate_strong_password(password: &str) -> Result<(), ValidationError> {
    if is_strong_password(password) {
        Ok(())
    } else {
        Err(ValidationError::new("password"))
    }
}

/// Empty strings count as missing for `required`
fn present(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Fields of a new account
#[derive(Debug, Clone, Validate)]
pub struct NewUserInput {
    #[validate(required, email)]
    pub email: Option<String>,

    #[validate(
        required,
        length(min = 3, max = 50),
        regex(path = *ALPHANUMERIC, code = "alphanum")
    )]
    pub username: Option<String>,

    #[validate(required, custom(function = "validate_strong_password"))]
    pub password: Option<String>,
}

impl NewUserInput {
    pub fn new(email: &str, username: &str, password: &str) -> Self {
        Self {
            email: present(email.to_string()),
            username: present(username.to_string()),
            password: present(password.to_string()),
        }
    }
}

/// Replacement password
#[derive(Debug, Clone, Validate)]
pub struct PasswordInput {
    #[validate(required, custom(function = "validate_strong_password"))]
    pub password: Option<String>,
}

impl PasswordInput {
    pub fn new(password: &str) -> Self {
        Self {
            password: present(password.to_string()),
        }
    }
}

/// Email used as a lookup key
#[derive(Debug, Clone, Validate)]
pub struct EmailInput {
    #[validate(required, email)]
    pub email: Option<String>,
}

impl EmailInput {
    pub fn new(email: &str) -> Self {
        Self {
            email: present(email.to_string()),
        }
    }
}

/// Username used as a lookup key
#[derive(Debug, Clone, Validate)]
pub struct UsernameInput {
    #[validate(required)]
    pub username: Option<String>,
}

impl UsernameInput {
    pub fn new(username: &str) -> Self {
        Self {
            username: present(username.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_password_table() {
        let cases = [
            ("123", false, "short, digits only"),
            ("@##$#", false, "short, symbols only"),
            ("ABCDE", false, "short, uppercase only"),
            ("abc", false, "short, lowercase only"),
            ("123456789", false, "digits only"),
            ("@@@$$$%^^#$#@$#", false, "symbols only"),
            ("EUSOUASENHATESTELONGA", false, "uppercase only"),
            ("eusouasenhatestelonga", false, "lowercase only"),
            ("Testando123", false, "no symbol"),
            ("testando123@", false, "no uppercase"),
            ("TESTANDO123@", false, "no lowercase"),
            ("TESTanDO@#$#", false, "no digit"),
            ("Testando123@", true, "every class present"),
        ];

        for (password, expected, case) in cases {
            assert_eq!(is_strong_password(password), expected, "case: {}", case);
        }
    }

    #[test]
    fn test_strong_password_requires_eight_bytes() {
        assert!(!is_strong_password("Ab1@xyz"));
        assert!(is_strong_password("Ab1@xyzw"));
    }

    #[test]
    fn test_custom_rule_code() {
        let err = validate_strong_password("weak").unwrap_err();
        assert_eq!(err.code, "password");
        assert!(validate_strong_password("Testing123@123").is_ok());
    }

    #[test]
    fn test_new_user_input_valid() {
        let input = NewUserInput::new("testing@testing.com", "tester", "Testing123@123");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_new_user_input_empty_fields_are_missing() {
        let input = NewUserInput::new("", "", "");
        assert!(input.email.is_none());

        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_username_must_be_alphanumeric() {
        let input = NewUserInput::new("a@b.co", "bad_name", "Testing123@123");
        let errors = input.validate().unwrap_err();
        let codes: Vec<_> = errors.field_errors()["username"]
            .iter()
            .map(|e| e.code.to_string())
            .collect();

        assert_eq!(codes, vec!["alphanum".to_string()]);
    }

    #[test]
    fn test_compile_rules_does_not_panic() {
        compile_rules();
    }
}
