// src/api/auth.rs
// =========================================================================
// AUTH – login, token refresh, logout, current account
// =========================================================================
use crate::api::error::{ok, ApiResult};
use crate::api::extract::{ApiJson, CurrentUser};
use crate::domains::user::Credentials;
use crate::state::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Payload { "email": "...", "password": "..." }
pub async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let result = state.auth.login(&credentials).await?;
    Ok(ok(result))
}

/// Payload { "refresh_token": "..." }
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let result = state.auth.refresh_session(&request.refresh_token).await?;
    Ok(ok(result))
}

/// Revokes the presented access token and, when given, the refresh token
pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Option<ApiJson<LogoutRequest>>,
) -> ApiResult<impl IntoResponse> {
    let request = body.map(|ApiJson(request)| request).unwrap_or_default();
    state
        .auth
        .logout(&user.auth, &user.token, request.refresh_token.as_deref())
        .await?;
    Ok(ok(()))
}

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    let account = state.users.get_user(user.auth.user_id, &user.auth).await?;
    Ok(ok(account))
}
