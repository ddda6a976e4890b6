//! v1 API endpoints

pub mod users;

use axum::{
    routing::{get, post, put},
    Router,
};

use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/users", post(users::create_user).get(users::list_users))
        .route("/users/lookup", get(users::lookup_user))
        .route("/users/batch", post(users::batch_get_users))
        .route(
            "/users/{user_id}",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/users/{user_id}/password", put(users::update_password))
}
