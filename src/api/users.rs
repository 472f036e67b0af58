// src/api/users.rs
use crate::api::error::{created, ok, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, CurrentUser};
use crate::domains::user::NewUser;
use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use uuid::Uuid;

pub async fn list(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.users.list_users(&user.auth).await?))
}

/// Payload { "email", "password", "name", "role": "admin|agency|focal", "agency_id" }
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(new_user): ApiJson<NewUser>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(state.users.create_user(new_user, &user.auth).await?))
}

pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.users.get_user(id, &user.auth).await?))
}
