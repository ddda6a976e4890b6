//! In-memory user repository implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::user::{
    DeleteUserParams, InsertUserParams, ListUsersParams, LookupByEmailParams, LookupByIdParams,
    LookupByIdsParams, LookupByUsernameParams, UpdatePasswordParams, User, UsersRepository,
};
use crate::domain::DomainError;

#[derive(Debug, Clone, Default)]
struct Store {
    users: HashMap<Uuid, User>,
    /// session id -> user id
    sessions: HashMap<Uuid, Uuid>,
}

impl Store {
    fn visible(&self, include_deleted: bool) -> impl Iterator<Item = &User> {
        self.users
            .values()
            .filter(move |u| include_deleted || u.is_active())
    }

    fn active_with(&self, matches: impl Fn(&User) -> bool) -> bool {
        self.users.values().any(|u| u.is_active() && matches(u))
    }
}

/// In-memory implementation of `UsersRepository`
///
/// Deletes stage their changes on a copy of the store and swap it in only
/// when every step succeeded.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    store: RwLock<Store>,
    fail_user_row_delete: AtomicBool,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session for a user and return its ID
    pub async fn insert_session(&self, user_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.store.write().await.sessions.insert(id, user_id);
        id
    }

    pub async fn session_count(&self, user_id: Uuid) -> usize {
        self.store
            .read()
            .await
            .sessions
            .values()
            .filter(|owner| **owner == user_id)
            .count()
    }

    /// Make the user-row step of every later delete fail
    pub fn fail_user_row_delete(&self, fail: bool) {
        self.fail_user_row_delete.store(fail, Ordering::SeqCst);
    }
}

fn sorted(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
    users
}

#[async_trait]
impl UsersRepository for InMemoryUserRepository {
    async fn lookup_by_email(
        &self,
        params: LookupByEmailParams,
    ) -> Result<Option<User>, DomainError> {
        let store = self.store.read().await;

        Ok(store
            .visible(params.include_deleted)
            .find(|u| u.email() == params.email)
            .cloned())
    }

    async fn lookup_by_username(
        &self,
        params: LookupByUsernameParams,
    ) -> Result<Option<User>, DomainError> {
        let store = self.store.read().await;

        Ok(store
            .visible(params.include_deleted)
            .find(|u| u.username() == params.username)
            .cloned())
    }

    async fn lookup_by_id(&self, params: LookupByIdParams) -> Result<Option<User>, DomainError> {
        let store = self.store.read().await;

        Ok(store
            .users
            .get(&params.id)
            .filter(|u| params.include_deleted || u.is_active())
            .cloned())
    }

    async fn lookup_by_ids(&self, params: LookupByIdsParams) -> Result<Vec<User>, DomainError> {
        if params.ids.is_empty() {
            return Ok(Vec::new());
        }

        let store = self.store.read().await;
        let users = store
            .visible(params.include_deleted)
            .filter(|u| params.ids.contains(&u.id()))
            .cloned()
            .collect();

        Ok(sorted(users))
    }

    async fn list(&self, params: ListUsersParams) -> Result<Vec<User>, DomainError> {
        let store = self.store.read().await;
        let users = sorted(store.visible(params.include_deleted).cloned().collect());

        Ok(users
            .into_iter()
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .collect())
    }

    async fn insert(&self, params: InsertUserParams) -> Result<User, DomainError> {
        let mut store = self.store.write().await;

        if store.active_with(|u| u.email() == params.email) {
            return Err(DomainError::conflict("users_email_active_key"));
        }

        if store.active_with(|u| u.username() == params.username) {
            return Err(DomainError::conflict("users_username_active_key"));
        }

        let user = User::new(
            Uuid::new_v4(),
            params.email,
            params.username,
            params.password_hash,
            Utc::now(),
        );
        store.users.insert(user.id(), user.clone());

        Ok(user)
    }

    async fn update_password(&self, params: UpdatePasswordParams) -> Result<User, DomainError> {
        let mut store = self.store.write().await;

        let user = store
            .users
            .get_mut(&params.user_id)
            .ok_or_else(|| DomainError::not_found("update password: no rows returned"))?;

        user.set_password_hash(params.password_hash, Utc::now());

        Ok(user.clone())
    }

    async fn delete(&self, params: DeleteUserParams) -> Result<(), DomainError> {
        let mut store = self.store.write().await;
        let mut staged = store.clone();

        if params.hard {
            staged.sessions.retain(|_, owner| *owner != params.id);
        }

        if self.fail_user_row_delete.load(Ordering::SeqCst) {
            return Err(DomainError::transaction(
                "failed to delete user: user row step failed",
            ));
        }

        if params.hard {
            staged.users.remove(&params.id);
        } else if let Some(user) = staged.users.get_mut(&params.id) {
            user.mark_deleted(Utc::now());
        }

        *store = staged;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_params(email: &str, username: &str) -> InsertUserParams {
        InsertUserParams {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    async fn lookup(repo: &InMemoryUserRepository, id: Uuid, include_deleted: bool) -> Option<User> {
        repo.lookup_by_id(LookupByIdParams {
            id,
            include_deleted,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_lookup() {
        let repo = InMemoryUserRepository::new();

        let user = repo.insert(insert_params("jane@example.com", "jane")).await.unwrap();
        assert_eq!(user.created_at(), user.updated_at());
        assert!(user.is_active());

        let by_email = repo
            .lookup_by_email(LookupByEmailParams {
                email: "jane@example.com".to_string(),
                include_deleted: false,
            })
            .await
            .unwrap();
        let by_username = repo
            .lookup_by_username(LookupByUsernameParams {
                username: "jane".to_string(),
                include_deleted: false,
            })
            .await
            .unwrap();

        assert_eq!(by_email.as_ref(), Some(&user));
        assert_eq!(by_username.as_ref(), Some(&user));
        assert_eq!(lookup(&repo, user.id(), false).await, Some(user));
    }

    #[tokio::test]
    async fn test_insert_conflicts_with_active_rows_only() {
        let repo = InMemoryUserRepository::new();
        let user = repo.insert(insert_params("jane@example.com", "jane")).await.unwrap();

        let err = repo
            .insert(insert_params("jane@example.com", "other"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("email"));

        let err = repo
            .insert(insert_params("other@example.com", "jane"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("username"));

        repo.delete(DeleteUserParams {
            id: user.id(),
            hard: false,
        })
        .await
        .unwrap();

        let reused = repo.insert(insert_params("jane@example.com", "jane")).await;
        assert!(reused.is_ok());
    }

    #[tokio::test]
    async fn test_soft_delete_is_idempotent() {
        let repo = InMemoryUserRepository::new();
        let user = repo.insert(insert_params("jane@example.com", "jane")).await.unwrap();
        let params = DeleteUserParams {
            id: user.id(),
            hard: false,
        };

        repo.delete(params.clone()).await.unwrap();
        let first = lookup(&repo, user.id(), true).await.unwrap();

        repo.delete(params).await.unwrap();
        let second = lookup(&repo, user.id(), true).await.unwrap();

        assert!(first.deleted_at().is_some());
        assert!(second.deleted_at().is_some());
        assert!(second.deleted_at() >= first.deleted_at());
        assert!(lookup(&repo, user.id(), false).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_succeeds() {
        let repo = InMemoryUserRepository::new();

        for hard in [false, true] {
            let result = repo
                .delete(DeleteUserParams {
                    id: Uuid::new_v4(),
                    hard,
                })
                .await;
            assert!(result.is_ok());
        }
    }

    #[tokio::test]
    async fn test_hard_delete_removes_sessions_and_user() {
        let repo = InMemoryUserRepository::new();
        let user = repo.insert(insert_params("jane@example.com", "jane")).await.unwrap();
        let other = repo.insert(insert_params("john@example.com", "john")).await.unwrap();
        repo.insert_session(user.id()).await;
        repo.insert_session(user.id()).await;
        repo.insert_session(other.id()).await;

        repo.delete(DeleteUserParams {
            id: user.id(),
            hard: true,
        })
        .await
        .unwrap();

        assert_eq!(repo.session_count(user.id()).await, 0);
        assert_eq!(repo.session_count(other.id()).await, 1);
        assert!(lookup(&repo, user.id(), true).await.is_none());
    }

    #[tokio::test]
    async fn test_hard_delete_failure_leaves_everything_in_place() {
        let repo = InMemoryUserRepository::new();
        let user = repo.insert(insert_params("jane@example.com", "jane")).await.unwrap();
        repo.insert_session(user.id()).await;
        repo.insert_session(user.id()).await;
        repo.fail_user_row_delete(true);

        let result = repo
            .delete(DeleteUserParams {
                id: user.id(),
                hard: true,
            })
            .await;

        assert!(matches!(result, Err(DomainError::Transaction { .. })));
        assert_eq!(repo.session_count(user.id()).await, 2);
        assert_eq!(lookup(&repo, user.id(), false).await, Some(user));
    }

    #[tokio::test]
    async fn test_lookup_by_ids() {
        let repo = InMemoryUserRepository::new();
        let jane = repo.insert(insert_params("jane@example.com", "jane")).await.unwrap();
        let john = repo.insert(insert_params("john@example.com", "john")).await.unwrap();

        let empty = repo
            .lookup_by_ids(LookupByIdsParams {
                ids: vec![],
                include_deleted: false,
            })
            .await
            .unwrap();
        assert!(empty.is_empty());

        repo.delete(DeleteUserParams {
            id: john.id(),
            hard: false,
        })
        .await
        .unwrap();

        let found = repo
            .lookup_by_ids(LookupByIdsParams {
                ids: vec![jane.id(), john.id(), Uuid::new_v4()],
                include_deleted: false,
            })
            .await
            .unwrap();
        assert_eq!(found, vec![jane]);
    }

    #[tokio::test]
    async fn test_list_pages_in_creation_order() {
        let repo = InMemoryUserRepository::new();
        let mut inserted = Vec::new();
        for i in 0..5 {
            let user = repo
                .insert(insert_params(&format!("user{}@example.com", i), &format!("user{}", i)))
                .await
                .unwrap();
            inserted.push(user);
        }
        let expected = sorted(inserted);

        let page = repo
            .list(ListUsersParams {
                limit: 2,
                offset: 1,
                include_deleted: false,
            })
            .await
            .unwrap();

        assert_eq!(page, expected[1..3].to_vec());
    }

    #[tokio::test]
    async fn test_update_password() {
        let repo = InMemoryUserRepository::new();
        let user = repo.insert(insert_params("jane@example.com", "jane")).await.unwrap();

        let updated = repo
            .update_password(UpdatePasswordParams {
                user_id: user.id(),
                password_hash: "new_hash".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(updated.password_hash(), "new_hash");
        assert!(updated.updated_at() >= user.updated_at());

        let missing = repo
            .update_password(UpdatePasswordParams {
                user_id: Uuid::new_v4(),
                password_hash: "new_hash".to_string(),
            })
            .await;
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));
    }
}
