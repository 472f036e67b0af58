use crate::auth::AuthContext;
use crate::domains::core::{FindById, SoftDeletable};
use crate::domains::submission::types::{
    ProgramSubmission, ProgramTarget, SubmissionRow, TargetFields, TargetRow,
};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::format_date;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Submission columns written when a draft is created
#[derive(Debug, Clone)]
pub struct SubmissionInsert {
    pub program_id: Uuid,
    pub period_id: Uuid,
    pub description: Option<String>,
    pub created_by_user_id: Uuid,
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync + FindById<ProgramSubmission> + SoftDeletable {
    async fn find_by_id_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ProgramSubmission>;

    /// Insert a draft, but only while the period is open.
    /// `None` means the period was not open.
    async fn create_draft_with_tx<'t>(
        &self,
        submission: &SubmissionInsert,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Option<ProgramSubmission>>;

    /// Overwrite the description of a live draft; false when it is not one
    async fn update_draft_with_tx<'t>(
        &self,
        id: Uuid,
        description: Option<&str>,
        updated_by: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<bool>;

    /// Draft -> finalized for a submission of `agency_id`. Returns rows affected.
    async fn finalize_with_tx<'t>(
        &self,
        id: Uuid,
        program_id: Uuid,
        period_id: Uuid,
        agency_id: Uuid,
        actor: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<u64>;

    /// Finalized -> draft for a submission of `agency_id`. Returns rows affected.
    async fn unsubmit_with_tx<'t>(
        &self,
        id: Uuid,
        agency_id: Uuid,
        actor: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<u64>;

    async fn find_for_program(&self, program_id: Uuid) -> DomainResult<Vec<ProgramSubmission>>;

    /// Live submissions of a period, limited to one agency when given
    async fn find_for_period(
        &self,
        period_id: Uuid,
        agency_id: Option<Uuid>,
    ) -> DomainResult<Vec<ProgramSubmission>>;
}

#[async_trait]
pub trait TargetRepository: Send + Sync + FindById<ProgramTarget> {
    async fn find_by_id_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ProgramTarget>;

    /// Every target number ever used in the submission, deleted targets included
    async fn find_numbers_for_submission_with_tx<'t>(
        &self,
        submission_id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Vec<String>>;

    /// Insert into a live draft submission; `None` when it is not one
    async fn create_with_tx<'t>(
        &self,
        submission_id: Uuid,
        target_number: &str,
        fields: &TargetFields,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Option<ProgramTarget>>;

    /// Update a live target of a live draft; false when either guard fails
    async fn update_with_tx<'t>(
        &self,
        id: Uuid,
        fields: &TargetFields,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<bool>;

    async fn soft_delete_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<bool>;

    async fn find_for_submission(&self, submission_id: Uuid) -> DomainResult<Vec<ProgramTarget>>;
}

const DRAFT_GUARD: &str = "SELECT submission_id FROM program_submissions WHERE is_draft = 1 AND is_deleted = 0";

pub struct SqliteSubmissionRepository {
    pool: SqlitePool,
}

impl SqliteSubmissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FindById<ProgramSubmission> for SqliteSubmissionRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<ProgramSubmission> {
        query_as::<_, SubmissionRow>(
            "SELECT * FROM program_submissions WHERE submission_id = ? AND is_deleted = 0"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("Submission".to_string(), id))?
        .into_entity()
    }
}

#[async_trait]
impl SoftDeletable for SqliteSubmissionRepository {
    /// Only drafts can be deleted; their targets go with them
    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        auth: &AuthContext,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();
        let result = query(
            "UPDATE program_submissions SET is_deleted = 1, updated_at = ?, updated_by_user_id = ?
             WHERE submission_id = ? AND is_draft = 1 AND is_deleted = 0"
        )
        .bind(&now)
        .bind(auth.user_id.to_string())
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::InvalidState(
                "Only draft submissions can be deleted".to_string(),
            ));
        }

        query("UPDATE program_targets SET is_deleted = 1, updated_at = ? WHERE submission_id = ? AND is_deleted = 0")
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}

#[async_trait]
impl SubmissionRepository for SqliteSubmissionRepository {
    async fn find_by_id_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ProgramSubmission> {
        query_as::<_, SubmissionRow>(
            "SELECT * FROM program_submissions WHERE submission_id = ? AND is_deleted = 0"
        )
        .bind(id.to_string())
        .fetch_optional(&mut **tx)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("Submission".to_string(), id))?
        .into_entity()
    }

    async fn create_draft_with_tx<'t>(
        &self,
        submission: &SubmissionInsert,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Option<ProgramSubmission>> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let actor = submission.created_by_user_id.to_string();

        let result = query(
            "INSERT INTO program_submissions (
                submission_id, program_id, period_id, is_draft, is_submitted, description,
                is_deleted, created_at, updated_at, created_by_user_id, updated_by_user_id
             )
             SELECT ?, ?, ?, 1, 0, ?, 0, ?, ?, ?, ?
             WHERE EXISTS (SELECT 1 FROM reporting_periods WHERE period_id = ? AND status = 'open')"
        )
        .bind(id.to_string())
        .bind(submission.program_id.to_string())
        .bind(submission.period_id.to_string())
        .bind(&submission.description)
        .bind(&now)
        .bind(&now)
        .bind(&actor)
        .bind(&actor)
        .bind(submission.period_id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_violation() => DomainError::Conflict(
                "A submission already exists for this program and period".to_string(),
            ),
            err => DomainError::Database(err),
        })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id_with_tx(id, tx).await.map(Some)
    }

    async fn update_draft_with_tx<'t>(
        &self,
        id: Uuid,
        description: Option<&str>,
        updated_by: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<bool> {
        let result = query(
            "UPDATE program_submissions SET description = ?, updated_at = ?, updated_by_user_id = ?
             WHERE submission_id = ? AND is_draft = 1 AND is_deleted = 0"
        )
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .bind(updated_by.to_string())
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn finalize_with_tx<'t>(
        &self,
        id: Uuid,
        program_id: Uuid,
        period_id: Uuid,
        agency_id: Uuid,
        actor: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<u64> {
        let now = Utc::now().to_rfc3339();
        let result = query(
            "UPDATE program_submissions
             SET is_draft = 0, is_submitted = 1, submitted_at = ?, submitted_by = ?,
                 updated_at = ?, updated_by_user_id = ?
             WHERE submission_id = ? AND program_id = ? AND period_id = ?
               AND is_draft = 1 AND is_deleted = 0
               AND program_id IN (SELECT id FROM programs WHERE agency_id = ?)"
        )
        .bind(&now)
        .bind(actor.to_string())
        .bind(&now)
        .bind(actor.to_string())
        .bind(id.to_string())
        .bind(program_id.to_string())
        .bind(period_id.to_string())
        .bind(agency_id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected())
    }

    async fn unsubmit_with_tx<'t>(
        &self,
        id: Uuid,
        agency_id: Uuid,
        actor: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<u64> {
        let result = query(
            "UPDATE program_submissions
             SET is_draft = 1, is_submitted = 0, submitted_at = NULL, submitted_by = NULL,
                 updated_at = ?, updated_by_user_id = ?
             WHERE submission_id = ? AND is_submitted = 1 AND is_draft = 0 AND is_deleted = 0
               AND program_id IN (SELECT id FROM programs WHERE agency_id = ?)"
        )
        .bind(Utc::now().to_rfc3339())
        .bind(actor.to_string())
        .bind(id.to_string())
        .bind(agency_id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected())
    }

    async fn find_for_program(&self, program_id: Uuid) -> DomainResult<Vec<ProgramSubmission>> {
        let rows = query_as::<_, SubmissionRow>(
            "SELECT s.* FROM program_submissions s
             JOIN reporting_periods p ON p.period_id = s.period_id
             WHERE s.program_id = ? AND s.is_deleted = 0
             ORDER BY p.start_date DESC"
        )
        .bind(program_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(SubmissionRow::into_entity).collect()
    }

    async fn find_for_period(
        &self,
        period_id: Uuid,
        agency_id: Option<Uuid>,
    ) -> DomainResult<Vec<ProgramSubmission>> {
        let rows = query_as::<_, SubmissionRow>(
            "SELECT s.* FROM program_submissions s
             JOIN programs pr ON pr.id = s.program_id
             WHERE s.period_id = ? AND s.is_deleted = 0
               AND (? IS NULL OR pr.agency_id = ?)
             ORDER BY pr.program_number IS NULL, pr.program_number, pr.program_name"
        )
        .bind(period_id.to_string())
        .bind(agency_id.map(|a| a.to_string()))
        .bind(agency_id.map(|a| a.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(SubmissionRow::into_entity).collect()
    }
}

pub struct SqliteTargetRepository {
    pool: SqlitePool,
}

impl SqliteTargetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FindById<ProgramTarget> for SqliteTargetRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<ProgramTarget> {
        query_as::<_, TargetRow>("SELECT * FROM program_targets WHERE target_id = ? AND is_deleted = 0")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Target".to_string(), id))?
            .into_entity()
    }
}

#[async_trait]
impl TargetRepository for SqliteTargetRepository {
    async fn find_by_id_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<ProgramTarget> {
        query_as::<_, TargetRow>("SELECT * FROM program_targets WHERE target_id = ? AND is_deleted = 0")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Target".to_string(), id))?
            .into_entity()
    }

    async fn find_numbers_for_submission_with_tx<'t>(
        &self,
        submission_id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Vec<String>> {
        let numbers = query_scalar::<_, String>(
            "SELECT target_number FROM program_targets WHERE submission_id = ?"
        )
        .bind(submission_id.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;
        Ok(numbers)
    }

    async fn create_with_tx<'t>(
        &self,
        submission_id: Uuid,
        target_number: &str,
        fields: &TargetFields,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Option<ProgramTarget>> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        let sql = format!(
            "INSERT INTO program_targets (
                target_id, submission_id, target_number, target_description, status_indicator,
                status_description, remarks, start_date, end_date, is_deleted, created_at, updated_at
             )
             SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?
             WHERE ? IN ({})",
            DRAFT_GUARD
        );

        let result = query(&sql)
            .bind(id.to_string())
            .bind(submission_id.to_string())
            .bind(target_number)
            .bind(&fields.target_description)
            .bind(fields.status_indicator.as_str())
            .bind(&fields.status_description)
            .bind(&fields.remarks)
            .bind(fields.start_date.as_ref().map(format_date))
            .bind(fields.end_date.as_ref().map(format_date))
            .bind(&now)
            .bind(&now)
            .bind(submission_id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| match DbError::from(e) {
                err if err.is_unique_violation() => DomainError::Conflict(format!(
                    "Target number {} is already in use on this submission",
                    target_number
                )),
                err => DomainError::Database(err),
            })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id_with_tx(id, tx).await.map(Some)
    }

    async fn update_with_tx<'t>(
        &self,
        id: Uuid,
        fields: &TargetFields,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<bool> {
        let sql = format!(
            "UPDATE program_targets
             SET target_description = ?, status_indicator = ?, status_description = ?, remarks = ?,
                 start_date = ?, end_date = ?, updated_at = ?
             WHERE target_id = ? AND is_deleted = 0 AND submission_id IN ({})",
            DRAFT_GUARD
        );

        let result = query(&sql)
            .bind(&fields.target_description)
            .bind(fields.status_indicator.as_str())
            .bind(&fields.status_description)
            .bind(&fields.remarks)
            .bind(fields.start_date.as_ref().map(format_date))
            .bind(fields.end_date.as_ref().map(format_date))
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<bool> {
        let sql = format!(
            "UPDATE program_targets SET is_deleted = 1, updated_at = ?
             WHERE target_id = ? AND is_deleted = 0 AND submission_id IN ({})",
            DRAFT_GUARD
        );

        let result = query(&sql)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_for_submission(&self, submission_id: Uuid) -> DomainResult<Vec<ProgramTarget>> {
        let rows = query_as::<_, TargetRow>(
            "SELECT * FROM program_targets WHERE submission_id = ? AND is_deleted = 0 ORDER BY created_at ASC, rowid ASC"
        )
        .bind(submission_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(TargetRow::into_entity).collect()
    }
}
