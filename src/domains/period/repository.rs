use crate::domains::core::FindById;
use crate::domains::period::types::{
    PeriodCandidate, PeriodStatus, PeriodType, ReportingPeriod, ReportingPeriodRow,
};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::format_date;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

#[async_trait]
pub trait PeriodRepository: Send + Sync + FindById<ReportingPeriod> {
    async fn find_by_id_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ReportingPeriod>;

    /// The period with this (type, number, year), if any
    async fn find_by_key_with_tx<'t>(
        &self,
        period_type: PeriodType,
        period_number: i64,
        year: i64,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Option<ReportingPeriod>>;

    /// Periods whose date range intersects `[start, end]`
    async fn find_overlapping_with_tx<'t>(
        &self,
        candidate: &PeriodCandidate,
        exclude: Option<Uuid>,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Vec<ReportingPeriod>>;

    async fn create_with_tx<'t>(
        &self,
        candidate: &PeriodCandidate,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ReportingPeriod>;

    async fn update_with_tx<'t>(
        &self,
        id: Uuid,
        candidate: &PeriodCandidate,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ReportingPeriod>;

    /// Close every open period except `keep`; returns how many were closed
    async fn close_open_periods_with_tx<'t>(
        &self,
        keep: Option<Uuid>,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<u64>;

    /// Guarded status change; false when the period already had `status`
    async fn set_status_with_tx<'t>(
        &self,
        id: Uuid,
        status: PeriodStatus,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<bool>;

    async fn delete_with_tx<'t>(&self, id: Uuid, tx: &mut Transaction<'t, Sqlite>) -> DomainResult<()>;

    async fn count_live_submissions_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<i64>;

    async fn find_all(&self, year: Option<i64>) -> DomainResult<Vec<ReportingPeriod>>;

    async fn find_current_open(&self) -> DomainResult<Option<ReportingPeriod>>;
}

pub struct SqlitePeriodRepository {
    pool: SqlitePool,
}

impl SqlitePeriodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_write_error(e: sqlx::Error, candidate: &PeriodCandidate) -> DomainError {
        match DbError::from(e) {
            err if err.is_unique_violation() => {
                DomainError::Conflict(format!("Period {} already exists", candidate.display_name()))
            }
            err => DomainError::Database(err),
        }
    }
}

const SELECT_PERIOD: &str = "SELECT period_id, year, period_type, period_number, start_date, end_date, status, created_at, updated_at FROM reporting_periods";

// Chronological, with the coarsest granularity first on equal start dates
const ORDER_PERIODS: &str = " ORDER BY year ASC, start_date ASC,
    CASE period_type WHEN 'yearly' THEN 0 WHEN 'half' THEN 1 ELSE 2 END ASC,
    period_number ASC";

#[async_trait]
impl FindById<ReportingPeriod> for SqlitePeriodRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<ReportingPeriod> {
        query_as::<_, ReportingPeriodRow>(&format!("{} WHERE period_id = ?", SELECT_PERIOD))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("ReportingPeriod".to_string(), id))?
            .into_entity()
    }
}

#[async_trait]
impl PeriodRepository for SqlitePeriodRepository {
    async fn find_by_id_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ReportingPeriod> {
        query_as::<_, ReportingPeriodRow>(&format!("{} WHERE period_id = ?", SELECT_PERIOD))
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("ReportingPeriod".to_string(), id))?
            .into_entity()
    }

    async fn find_by_key_with_tx<'t>(
        &self,
        period_type: PeriodType,
        period_number: i64,
        year: i64,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Option<ReportingPeriod>> {
        query_as::<_, ReportingPeriodRow>(&format!(
            "{} WHERE period_type = ? AND period_number = ? AND year = ?",
            SELECT_PERIOD
        ))
        .bind(period_type.as_str())
        .bind(period_number)
        .bind(year)
        .fetch_optional(&mut **tx)
        .await
        .map_err(DbError::from)?
        .map(ReportingPeriodRow::into_entity)
        .transpose()
    }

    async fn find_overlapping_with_tx<'t>(
        &self,
        candidate: &PeriodCandidate,
        exclude: Option<Uuid>,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Vec<ReportingPeriod>> {
        // ISO dates compare correctly as text
        let rows = query_as::<_, ReportingPeriodRow>(&format!(
            "{} WHERE start_date <= ? AND end_date >= ? AND (? IS NULL OR period_id != ?){}",
            SELECT_PERIOD, ORDER_PERIODS
        ))
        .bind(format_date(&candidate.end_date))
        .bind(format_date(&candidate.start_date))
        .bind(exclude.map(|id| id.to_string()))
        .bind(exclude.map(|id| id.to_string()))
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(ReportingPeriodRow::into_entity).collect()
    }

    async fn create_with_tx<'t>(
        &self,
        candidate: &PeriodCandidate,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ReportingPeriod> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            "INSERT INTO reporting_periods (
                period_id, year, period_type, period_number, start_date, end_date, status, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(id.to_string())
        .bind(candidate.year)
        .bind(candidate.period_type.as_str())
        .bind(candidate.period_number)
        .bind(format_date(&candidate.start_date))
        .bind(format_date(&candidate.end_date))
        .bind(candidate.status.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut **tx)
        .await
        .map_err(|e| Self::map_write_error(e, candidate))?;

        self.find_by_id_with_tx(id, tx).await
    }

    async fn update_with_tx<'t>(
        &self,
        id: Uuid,
        candidate: &PeriodCandidate,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ReportingPeriod> {
        let result = query(
            "UPDATE reporting_periods
             SET year = ?, period_type = ?, period_number = ?, start_date = ?, end_date = ?, status = ?, updated_at = ?
             WHERE period_id = ?"
        )
        .bind(candidate.year)
        .bind(candidate.period_type.as_str())
        .bind(candidate.period_number)
        .bind(format_date(&candidate.start_date))
        .bind(format_date(&candidate.end_date))
        .bind(candidate.status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| Self::map_write_error(e, candidate))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EntityNotFound("ReportingPeriod".to_string(), id));
        }

        self.find_by_id_with_tx(id, tx).await
    }

    async fn close_open_periods_with_tx<'t>(
        &self,
        keep: Option<Uuid>,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<u64> {
        let result = query(
            "UPDATE reporting_periods SET status = 'closed', updated_at = ?
             WHERE status = 'open' AND (? IS NULL OR period_id != ?)"
        )
        .bind(Utc::now().to_rfc3339())
        .bind(keep.map(|id| id.to_string()))
        .bind(keep.map(|id| id.to_string()))
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected())
    }

    async fn set_status_with_tx<'t>(
        &self,
        id: Uuid,
        status: PeriodStatus,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<bool> {
        let result = query(
            "UPDATE reporting_periods SET status = ?, updated_at = ? WHERE period_id = ? AND status != ?"
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .bind(status.as_str())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_with_tx<'t>(&self, id: Uuid, tx: &mut Transaction<'t, Sqlite>) -> DomainResult<()> {
        // Soft-deleted submissions still hold foreign keys to the period
        query(
            "DELETE FROM program_targets WHERE submission_id IN (
                SELECT submission_id FROM program_submissions WHERE period_id = ? AND is_deleted = 1
             )"
        )
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        query("DELETE FROM program_submissions WHERE period_id = ? AND is_deleted = 1")
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;

        let result = query("DELETE FROM reporting_periods WHERE period_id = ?")
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EntityNotFound("ReportingPeriod".to_string(), id));
        }
        Ok(())
    }

    async fn count_live_submissions_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<i64> {
        let count = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM program_submissions WHERE period_id = ? AND is_deleted = 0"
        )
        .bind(id.to_string())
        .fetch_one(&mut **tx)
        .await
        .map_err(DbError::from)?;
        Ok(count)
    }

    async fn find_all(&self, year: Option<i64>) -> DomainResult<Vec<ReportingPeriod>> {
        let rows = query_as::<_, ReportingPeriodRow>(&format!(
            "{} WHERE (? IS NULL OR year = ?){}",
            SELECT_PERIOD, ORDER_PERIODS
        ))
        .bind(year)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(ReportingPeriodRow::into_entity).collect()
    }

    async fn find_current_open(&self) -> DomainResult<Option<ReportingPeriod>> {
        query_as::<_, ReportingPeriodRow>(&format!(
            "{} WHERE status = 'open' ORDER BY updated_at DESC LIMIT 1",
            SELECT_PERIOD
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .map(ReportingPeriodRow::into_entity)
        .transpose()
    }
}
