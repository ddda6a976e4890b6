//! User endpoint handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::infrastructure::user::{
    BatchGetUsersRequest, CreateUserRequest, DeleteUserRequest, GetUserRequest, ListUsersRequest,
    ListUsersResponse, UpdatePasswordRequest, UserResponse,
};

/// Query for `GET /v1/users/lookup`; email wins when both are given
#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Deserialize)]
pub struct UpdatePasswordBody {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<UserResponse>,
}

/// POST /v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.user_service.create_user(request).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /v1/users/{user_id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    debug!(user_id = %user_id, "Getting user");

    let user = state
        .user_service
        .get_user(GetUserRequest::Id(user_id))
        .await?;

    Ok(Json(user))
}

/// GET /v1/users/lookup?email=...|username=...
pub async fn lookup_user(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<UserResponse>, ApiError> {
    let request = match (query.email, query.username) {
        (Some(email), _) => GetUserRequest::Email(email),
        (None, Some(username)) => GetUserRequest::Username(username),
        (None, None) => {
            return Err(ApiError::bad_request("either 'email' or 'username' is required")
                .with_code("invalid_argument"));
        }
    };

    let user = state.user_service.get_user(request).await?;

    Ok(Json(user))
}

/// POST /v1/users/batch
pub async fn batch_get_users(
    State(state): State<AppState>,
    Json(request): Json<BatchGetUsersRequest>,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.user_service.get_users(request).await?;

    Ok(Json(UsersResponse { users }))
}

/// GET /v1/users?limit=&offset=
pub async fn list_users(
    State(state): State<AppState>,
    Query(request): Query<ListUsersRequest>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let page = state.user_service.list_users(request).await?;

    Ok(Json(page))
}

/// PUT /v1/users/{user_id}/password
pub async fn update_password(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdatePasswordBody>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .user_service
        .update_password(UpdatePasswordRequest {
            id: user_id,
            password: body.password,
        })
        .await?;

    Ok(Json(user))
}

/// DELETE /v1/users/{user_id}?hard=true|false
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .delete_user(DeleteUserRequest {
            id: user_id,
            hard: query.hard,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
