use crate::auth::AuthContext;
use crate::domains::audit::{AuditAction, AuditRepository, FieldChange, NewAuditEntry, SubjectType};
use crate::domains::core::FindById;
use crate::domains::period::conflict::find_conflict;
use crate::domains::period::repository::PeriodRepository;
use crate::domains::period::types::{
    PeriodCandidate, PeriodInput, PeriodResponse, PeriodStatus, ReportingPeriod,
};
use crate::errors::{DbError, DomainError, DomainResult, ServiceResult, ValidationError};
use crate::types::{format_date, Permission};
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait PeriodService: Send + Sync {
    /// Create a period. Opening it closes every other open period.
    async fn save_period(&self, input: PeriodInput, auth: &AuthContext) -> ServiceResult<PeriodResponse>;

    async fn update_period(
        &self,
        id: Uuid,
        input: PeriodInput,
        auth: &AuthContext,
    ) -> ServiceResult<PeriodResponse>;

    async fn set_status(&self, id: Uuid, status: &str, auth: &AuthContext) -> ServiceResult<PeriodResponse>;

    async fn get_period(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<PeriodResponse>;

    async fn list_periods(&self, year: Option<i64>, auth: &AuthContext) -> ServiceResult<Vec<PeriodResponse>>;

    async fn current_open_period(&self, auth: &AuthContext) -> ServiceResult<Option<PeriodResponse>>;

    /// Remove a period that no live submission refers to
    async fn delete_period(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<()>;
}

pub struct PeriodServiceImpl {
    pool: SqlitePool,
    repo: Arc<dyn PeriodRepository>,
    audit_repo: Arc<dyn AuditRepository>,
}

impl PeriodServiceImpl {
    pub fn new(
        pool: SqlitePool,
        repo: Arc<dyn PeriodRepository>,
        audit_repo: Arc<dyn AuditRepository>,
    ) -> Self {
        Self { pool, repo, audit_repo }
    }

    /// Duplicate key and same-granularity overlap checks, `exclude` being the period under update
    async fn check_conflicts<'t>(
        &self,
        candidate: &PeriodCandidate,
        exclude: Option<Uuid>,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<()> {
        let duplicate = self
            .repo
            .find_by_key_with_tx(candidate.period_type, candidate.period_number, candidate.year, tx)
            .await?;
        if let Some(existing) = duplicate {
            if Some(existing.period_id) != exclude {
                return Err(DomainError::Conflict(format!(
                    "Period {} already exists",
                    candidate.display_name()
                )));
            }
        }

        let overlapping = self.repo.find_overlapping_with_tx(candidate, exclude, tx).await?;
        if let Some(existing) = find_conflict(candidate, &overlapping) {
            return Err(DomainError::Conflict(format!(
                "Period {} overlaps with existing period {} ({} to {})",
                candidate.display_name(),
                existing.display_name(),
                format_date(&existing.start_date),
                format_date(&existing.end_date),
            )));
        }

        Ok(())
    }

    fn diff(before: &ReportingPeriod, after: &ReportingPeriod) -> Vec<FieldChange> {
        [
            FieldChange::diff("year", "integer", Some(before.year.to_string()), Some(after.year.to_string())),
            FieldChange::diff(
                "period_type",
                "text",
                Some(before.period_type.as_str().to_string()),
                Some(after.period_type.as_str().to_string()),
            ),
            FieldChange::diff(
                "period_number",
                "integer",
                Some(before.period_number.to_string()),
                Some(after.period_number.to_string()),
            ),
            FieldChange::diff("start_date", "date", Some(format_date(&before.start_date)), Some(format_date(&after.start_date))),
            FieldChange::diff("end_date", "date", Some(format_date(&before.end_date)), Some(format_date(&after.end_date))),
            FieldChange::diff(
                "status",
                "text",
                Some(before.status.as_str().to_string()),
                Some(after.status.as_str().to_string()),
            ),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[async_trait]
impl PeriodService for PeriodServiceImpl {
    async fn save_period(&self, input: PeriodInput, auth: &AuthContext) -> ServiceResult<PeriodResponse> {
        auth.authorize(Permission::ManagePeriods)?;
        let candidate = PeriodCandidate::try_from(&input)?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            self.check_conflicts(&candidate, None, &mut tx).await?;

            let closed = if candidate.status == PeriodStatus::Open {
                self.repo.close_open_periods_with_tx(None, &mut tx).await?
            } else {
                0
            };

            let period = self.repo.create_with_tx(&candidate, &mut tx).await?;

            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Create, SubjectType::Period, Some(period.period_id))
                .details(format!(
                    "Created period {} ({}); closed {} other open period(s)",
                    period.display_name(),
                    period.status.as_str(),
                    closed
                ))
                .with_changes(vec![
                    FieldChange::added("period_type", "text", period.period_type.as_str()),
                    FieldChange::added("period_number", "integer", period.period_number.to_string()),
                    FieldChange::added("year", "integer", period.year.to_string()),
                    FieldChange::added("start_date", "date", format_date(&period.start_date)),
                    FieldChange::added("end_date", "date", format_date(&period.end_date)),
                    FieldChange::added("status", "text", period.status.as_str()),
                ]);
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;

            Ok::<_, DomainError>(period)
        }
        .await;

        match result {
            Ok(period) => {
                tx.commit().await.map_err(DbError::from)?;
                log::info!("Period {} created by {}", period.display_name(), auth.user_id);
                Ok(period.into())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                log::warn!("Period {} rejected: {}", candidate.display_name(), e);
                Err(e.into())
            }
        }
    }

    async fn update_period(
        &self,
        id: Uuid,
        input: PeriodInput,
        auth: &AuthContext,
    ) -> ServiceResult<PeriodResponse> {
        auth.authorize(Permission::ManagePeriods)?;
        let candidate = PeriodCandidate::try_from(&input)?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let before = self.repo.find_by_id_with_tx(id, &mut tx).await?;
            self.check_conflicts(&candidate, Some(id), &mut tx).await?;

            if candidate.status == PeriodStatus::Open {
                self.repo.close_open_periods_with_tx(Some(id), &mut tx).await?;
            }

            let after = self.repo.update_with_tx(id, &candidate, &mut tx).await?;

            let changes = Self::diff(&before, &after);
            if !changes.is_empty() {
                let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Update, SubjectType::Period, Some(id))
                    .details(format!("Updated period {}", after.display_name()))
                    .with_changes(changes);
                self.audit_repo.create_with_tx(&entry, &mut tx).await?;
            }

            Ok::<_, DomainError>(after)
        }
        .await;

        match result {
            Ok(period) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(period.into())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn set_status(&self, id: Uuid, status: &str, auth: &AuthContext) -> ServiceResult<PeriodResponse> {
        auth.authorize(Permission::ManagePeriods)?;
        let status = PeriodStatus::from_str(status)
            .ok_or_else(|| ValidationError::invalid_value("status", "must be open or closed"))?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let before = self.repo.find_by_id_with_tx(id, &mut tx).await?;

            let closed = if status == PeriodStatus::Open {
                self.repo.close_open_periods_with_tx(Some(id), &mut tx).await?
            } else {
                0
            };

            let changed = self.repo.set_status_with_tx(id, status, &mut tx).await?;
            if changed {
                let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::StatusChange, SubjectType::Period, Some(id))
                    .details(format!(
                        "Period {} set to {}; closed {} other open period(s)",
                        before.display_name(),
                        status.as_str(),
                        closed
                    ))
                    .with_changes(FieldChange::diff(
                        "status",
                        "text",
                        Some(before.status.as_str().to_string()),
                        Some(status.as_str().to_string()),
                    ).into_iter().collect());
                self.audit_repo.create_with_tx(&entry, &mut tx).await?;
            }

            self.repo.find_by_id_with_tx(id, &mut tx).await
        }
        .await;

        match result {
            Ok(period) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(period.into())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn get_period(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<PeriodResponse> {
        auth.authorize(Permission::ViewPeriods)?;
        Ok(self.repo.find_by_id(id).await?.into())
    }

    async fn list_periods(&self, year: Option<i64>, auth: &AuthContext) -> ServiceResult<Vec<PeriodResponse>> {
        auth.authorize(Permission::ViewPeriods)?;
        let periods = self.repo.find_all(year).await?;
        Ok(periods.into_iter().map(PeriodResponse::from).collect())
    }

    async fn current_open_period(&self, auth: &AuthContext) -> ServiceResult<Option<PeriodResponse>> {
        auth.authorize(Permission::ViewPeriods)?;
        Ok(self.repo.find_current_open().await?.map(PeriodResponse::from))
    }

    async fn delete_period(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<()> {
        auth.authorize(Permission::ManagePeriods)?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let period = self.repo.find_by_id_with_tx(id, &mut tx).await?;

            if self.repo.count_live_submissions_with_tx(id, &mut tx).await? > 0 {
                return Err(DomainError::DependentRecordsExist {
                    entity_type: "ReportingPeriod".to_string(),
                    id,
                    dependencies: vec!["program_submissions".to_string()],
                });
            }

            self.repo.delete_with_tx(id, &mut tx).await?;

            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Delete, SubjectType::Period, Some(id))
                .details(format!("Deleted period {}", period.display_name()));
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;

            Ok::<_, DomainError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                log::info!("Period {} deleted by {}", id, auth.user_id);
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }
}
