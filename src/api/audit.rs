// src/api/audit.rs
use crate::api::error::{ok, ApiResult};
use crate::api::extract::{ApiPath, ApiQuery, CurrentUser};
use crate::domains::audit::types::AuditLogFilter;
use crate::domains::audit::{AuditAction, AuditOutcome, SubjectType};
use crate::state::AppState;
use crate::types::PaginationParams;
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// Filters and paging accepted on `GET /api/audit-logs`
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub subject_type: Option<SubjectType>,
    pub subject_id: Option<Uuid>,
    pub outcome: Option<AuditOutcome>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditLogQuery {
    fn into_parts(self) -> (AuditLogFilter, PaginationParams) {
        let defaults = PaginationParams::default();
        let params = PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
        .normalized();

        let filter = AuditLogFilter {
            user_id: self.user_id,
            action: self.action,
            subject_type: self.subject_type,
            subject_id: self.subject_id,
            outcome: self.outcome,
            from: self.from,
            to: self.to,
        };
        (filter, params)
    }
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<AuditLogQuery>,
) -> ApiResult<impl IntoResponse> {
    let (filter, params) = query.into_parts();
    Ok(ok(state.audit.list_logs(filter, params, &user.auth).await?))
}

pub async fn changes(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.audit.get_log_changes(id, &user.auth).await?))
}

/// Full trail of one subject, e.g. `/api/audit-logs/subjects/program/<id>`
pub async fn subject_history(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath((subject_type, subject_id)): ApiPath<(SubjectType, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(state.audit.subject_history(subject_type, subject_id, &user.auth).await?))
}
