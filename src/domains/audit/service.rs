use crate::auth::AuthContext;
use crate::domains::audit::repository::AuditRepository;
use crate::domains::audit::types::{AuditFieldChange, AuditLog, AuditLogFilter, SubjectType};
use crate::errors::ServiceResult;
use crate::types::{PaginatedResult, PaginationParams, Permission};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Read side of the audit trail for administrators
#[async_trait]
pub trait AuditService: Send + Sync {
    async fn list_logs(
        &self,
        filter: AuditLogFilter,
        params: PaginationParams,
        auth: &AuthContext,
    ) -> ServiceResult<PaginatedResult<AuditLog>>;

    async fn get_log_changes(
        &self,
        audit_log_id: Uuid,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<AuditFieldChange>>;

    async fn subject_history(
        &self,
        subject_type: SubjectType,
        subject_id: Uuid,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<AuditLog>>;
}

pub struct AuditServiceImpl {
    repo: Arc<dyn AuditRepository>,
}

impl AuditServiceImpl {
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl AuditService for AuditServiceImpl {
    async fn list_logs(
        &self,
        filter: AuditLogFilter,
        params: PaginationParams,
        auth: &AuthContext,
    ) -> ServiceResult<PaginatedResult<AuditLog>> {
        auth.authorize(Permission::ViewAuditLogs)?;
        Ok(self.repo.list(&filter, params).await?)
    }

    async fn get_log_changes(
        &self,
        audit_log_id: Uuid,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<AuditFieldChange>> {
        auth.authorize(Permission::ViewAuditLogs)?;
        // 404 for unknown ids rather than an empty list
        self.repo.find_by_id(audit_log_id).await?;
        Ok(self.repo.find_changes(audit_log_id).await?)
    }

    async fn subject_history(
        &self,
        subject_type: SubjectType,
        subject_id: Uuid,
        auth: &AuthContext,
    ) -> ServiceResult<Vec<AuditLog>> {
        auth.authorize(Permission::ViewAuditLogs)?;
        Ok(self.repo.find_by_subject(subject_type, subject_id).await?)
    }
}
