//! User entity

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Persisted user account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// Store-assigned identifier
    id: Uuid,
    email: String,
    username: String,
    /// Argon2 password hash - never exposed in serialization
    #[serde(skip_serializing)]
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// `None` while the account is active
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Build a freshly inserted user; both timestamps start equal
    pub fn new(
        id: Uuid,
        email: impl Into<String>,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Rebuild a user from a stored row
    #[allow(clippy::too_many_arguments)]
    pub fn from_row(
        id: Uuid,
        email: String,
        username: String,
        password_hash: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            email,
            username,
            password_hash,
            created_at,
            updated_at,
            deleted_at,
        }
    }

    // Getters

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Active rows are the ones without a deletion timestamp
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    // Mutators

    /// Replace the password hash
    pub fn set_password_hash(&mut self, password_hash: impl Into<String>, at: DateTime<Utc>) {
        self.password_hash = password_hash.into();
        self.updated_at = at;
    }

    /// Soft delete. Nothing clears `deleted_at` once set.
    pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_user() -> User {
        User::new(
            Uuid::new_v4(),
            "jane@example.com",
            "jane",
            "hashed_password",
            Utc::now(),
        )
    }

    #[test]
    fn test_user_creation() {
        let user = create_test_user();

        assert_eq!(user.email(), "jane@example.com");
        assert_eq!(user.username(), "jane");
        assert_eq!(user.created_at(), user.updated_at());
        assert!(user.is_active());
    }

    #[test]
    fn test_user_update_password() {
        let mut user = create_test_user();
        let later = user.updated_at() + Duration::seconds(5);

        user.set_password_hash("new_hash", later);

        assert_eq!(user.password_hash(), "new_hash");
        assert_eq!(user.updated_at(), later);
        assert!(user.updated_at() > user.created_at());
    }

    #[test]
    fn test_mark_deleted_stays_inactive() {
        let mut user = create_test_user();
        let first = user.created_at() + Duration::seconds(1);
        let second = first + Duration::seconds(1);

        user.mark_deleted(first);
        assert!(!user.is_active());

        user.mark_deleted(second);
        assert!(!user.is_active());
        assert_eq!(user.deleted_at(), Some(second));
    }

    #[test]
    fn test_user_serialization_excludes_password() {
        let user = create_test_user();

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hashed_password"));
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("deleted_at"));
    }
}
