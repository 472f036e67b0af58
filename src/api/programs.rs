// src/api/programs.rs
// =========================================================================
// INITIATIVES & PROGRAMS – hierarchical numbering lives in the service
// =========================================================================
use crate::api::error::{created, ok, ApiResult};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::domains::program::{NewInitiative, NewProgram, ProgramFilter, UpdateProgram};
use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;

pub async fn list_initiatives(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.programs.list_initiatives(&user.auth).await?))
}

/// Payload { "name", "initiative_number", "description" }
pub async fn create_initiative(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(initiative): ApiJson<NewInitiative>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(state.programs.create_initiative(initiative, &user.auth).await?))
}

pub async fn get_initiative(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.programs.get_initiative(id, &user.auth).await?))
}

pub async fn next_program_number(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let number = state.programs.preview_next_number(id, &user.auth).await?;
    Ok(ok(json!({ "initiative_id": id, "program_number": number })))
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(filter): ApiQuery<ProgramFilter>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.programs.list_programs(filter, &user.auth).await?))
}

/// Payload { "program_name", "description", "initiative_id", "program_number", "agency_id" }
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(program): ApiJson<NewProgram>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(state.programs.create_program(program, &user.auth).await?))
}

pub async fn get(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.programs.get_program(id, &user.auth).await?))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UpdateProgram>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.programs.update_program(id, update, &user.auth).await?))
}

pub async fn submissions(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.submissions.list_for_program(id, &user.auth).await?))
}
