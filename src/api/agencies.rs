// src/api/agencies.rs
use crate::api::error::{created, ok, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, CurrentUser};
use crate::domains::agency::NewAgency;
use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use uuid::Uuid;

pub async fn list(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.agencies.list_agencies(&user.auth).await?))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(agency): ApiJson<NewAgency>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(state.agencies.create_agency(agency, &user.auth).await?))
}

pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.agencies.get_agency(id, &user.auth).await?))
}
