// src/api/submissions.rs
// =========================================================================
// SUBMISSIONS & TARGETS – draft editing, finalize / unsubmit, history
// =========================================================================
use crate::api::error::{created, ok, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, CurrentUser};
use crate::domains::submission::{FinalizeRequest, NewSubmission, NewTarget, UpdateSubmission, UpdateTarget};
use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use uuid::Uuid;

/// Payload { "program_id", "period_id", "description" }
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(submission): ApiJson<NewSubmission>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(state.submissions.create_submission(submission, &user.auth).await?))
}

pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.submissions.get_submission(id, &user.auth).await?))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UpdateSubmission>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.submissions.update_submission(id, update, &user.auth).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.submissions.delete_submission(id, &user.auth).await?;
    Ok(ok(()))
}

/// Payload { "program_id", "period_id" }
pub async fn finalize(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<FinalizeRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.submissions.finalize(id, request, &user.auth).await?))
}

pub async fn unsubmit(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.submissions.unsubmit(id, &user.auth).await?))
}

pub async fn history(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.submissions.history(id, &user.auth).await?))
}

pub async fn list_targets(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.submissions.list_targets(id, &user.auth).await?))
}

/// Payload { "target_description", "status_indicator", "status_description", "remarks", "start_date", "end_date" }
pub async fn add_target(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(target): ApiJson<NewTarget>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(state.submissions.add_target(id, target, &user.auth).await?))
}

pub async fn update_target(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UpdateTarget>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.submissions.update_target(id, update, &user.auth).await?))
}

pub async fn delete_target(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.submissions.delete_target(id, &user.auth).await?;
    Ok(ok(()))
}
