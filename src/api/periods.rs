// src/api/periods.rs
// =========================================================================
// REPORTING PERIODS – CRUD, status toggle, current open period
// =========================================================================
use crate::api::error::{created, ok, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::domains::period::PeriodInput;
use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct PeriodListQuery {
    pub year: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<PeriodListQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.periods.list_periods(query.year, &user.auth).await?))
}

/// Payload { "period_type", "period_number", "year", "start_date", "end_date", "status" }
pub async fn save(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<PeriodInput>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(state.periods.save_period(input, &user.auth).await?))
}

pub async fn current(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.periods.current_open_period(&user.auth).await?))
}

pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.periods.get_period(id, &user.auth).await?))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<PeriodInput>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.periods.update_period(id, input, &user.auth).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.periods.delete_period(id, &user.auth).await?;
    Ok(ok(()))
}

/// Payload { "status": "open" | "closed" }
pub async fn set_status(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.periods.set_status(id, &request.status, &user.auth).await?))
}

/// Submissions of one period; administrators see every agency
pub async fn submissions(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.submissions.list_for_period(id, &user.auth).await?))
}
