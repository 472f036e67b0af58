use crate::auth::AuthContext;
use crate::domains::audit::{AuditAction, AuditLog, AuditRepository, FieldChange, NewAuditEntry, SubjectType};
use crate::domains::core::{FindById, SoftDeletable};
use crate::domains::period::PeriodRepository;
use crate::domains::program::numbering::next_child_number;
use crate::domains::program::{Program, ProgramRepository};
use crate::domains::submission::repository::{SubmissionInsert, SubmissionRepository, TargetRepository};
use crate::domains::submission::types::{
    FinalizeRequest, NewSubmission, NewTarget, ProgramSubmission, ProgramTarget, SubmissionDetail,
    TargetFields, UpdateSubmission, UpdateTarget,
};
use crate::errors::{DbError, DomainError, DomainResult, ServiceResult};
use crate::types::{apply_text_update, format_date, Permission};
use crate::validation::Validate;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const NOT_FINALIZABLE: &str = "Submission not found or already finalized";
const LOCKED_TARGETS: &str = "Targets cannot be changed after the submission is finalized";

#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn create_submission(&self, submission: NewSubmission, auth: &AuthContext) -> ServiceResult<ProgramSubmission>;
    async fn get_submission(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<SubmissionDetail>;
    async fn update_submission(&self, id: Uuid, update: UpdateSubmission, auth: &AuthContext) -> ServiceResult<ProgramSubmission>;
    async fn delete_submission(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<()>;

    /// Draft -> finalized. Every failed precondition reports the same error.
    async fn finalize(&self, id: Uuid, request: FinalizeRequest, auth: &AuthContext) -> ServiceResult<ProgramSubmission>;

    /// Finalized -> draft, for focal users of the owning agency
    async fn unsubmit(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<ProgramSubmission>;

    async fn list_for_program(&self, program_id: Uuid, auth: &AuthContext) -> ServiceResult<Vec<ProgramSubmission>>;
    async fn list_for_period(&self, period_id: Uuid, auth: &AuthContext) -> ServiceResult<Vec<ProgramSubmission>>;
    async fn history(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Vec<AuditLog>>;

    async fn add_target(&self, submission_id: Uuid, target: NewTarget, auth: &AuthContext) -> ServiceResult<ProgramTarget>;
    async fn update_target(&self, target_id: Uuid, update: UpdateTarget, auth: &AuthContext) -> ServiceResult<ProgramTarget>;
    async fn delete_target(&self, target_id: Uuid, auth: &AuthContext) -> ServiceResult<()>;
    async fn list_targets(&self, submission_id: Uuid, auth: &AuthContext) -> ServiceResult<Vec<ProgramTarget>>;
}

pub struct SubmissionServiceImpl {
    pool: SqlitePool,
    repo: Arc<dyn SubmissionRepository>,
    target_repo: Arc<dyn TargetRepository>,
    program_repo: Arc<dyn ProgramRepository>,
    period_repo: Arc<dyn PeriodRepository>,
    audit_repo: Arc<dyn AuditRepository>,
}

impl SubmissionServiceImpl {
    pub fn new(
        pool: SqlitePool,
        repo: Arc<dyn SubmissionRepository>,
        target_repo: Arc<dyn TargetRepository>,
        program_repo: Arc<dyn ProgramRepository>,
        period_repo: Arc<dyn PeriodRepository>,
        audit_repo: Arc<dyn AuditRepository>,
    ) -> Self {
        Self { pool, repo, target_repo, program_repo, period_repo, audit_repo }
    }

    /// Load a live submission and check the caller may see its program's agency
    async fn authorized_submission(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<(ProgramSubmission, Program)> {
        let submission = self.repo.find_by_id(id).await?;
        let program = self.program_repo.find_by_id(submission.program_id).await?;
        auth.authorize_agency_access(&program.agency_id)?;
        Ok((submission, program))
    }

    /// Failed lifecycle transitions are audited outside the rolled back transaction
    async fn record_failure(&self, action: AuditAction, id: Uuid, reason: &str, auth: &AuthContext) {
        let entry = NewAuditEntry::new(Some(auth.user_id), action, SubjectType::Submission, Some(id))
            .details(reason)
            .failure();
        if let Err(e) = self.audit_repo.create(&entry).await {
            log::error!("Failed to audit {} failure for submission {}: {}", action.as_str(), id, e);
        }
    }
}

fn flag(value: bool) -> String {
    (value as u8).to_string()
}

fn lifecycle_changes(from_draft: bool) -> Vec<FieldChange> {
    [
        FieldChange::diff("is_draft", "boolean", Some(flag(from_draft)), Some(flag(!from_draft))),
        FieldChange::diff("is_submitted", "boolean", Some(flag(!from_draft)), Some(flag(from_draft))),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn target_changes(before: &ProgramTarget, after: &TargetFields) -> Vec<FieldChange> {
    let date = |d: &Option<chrono::NaiveDate>| d.as_ref().map(format_date);
    [
        FieldChange::diff("target_description", "text", Some(before.target_description.clone()), Some(after.target_description.clone())),
        FieldChange::diff("status_indicator", "text", Some(before.status_indicator.as_str().to_string()), Some(after.status_indicator.as_str().to_string())),
        FieldChange::diff("status_description", "text", before.status_description.clone(), after.status_description.clone()),
        FieldChange::diff("remarks", "text", before.remarks.clone(), after.remarks.clone()),
        FieldChange::diff("start_date", "date", date(&before.start_date), date(&after.start_date)),
        FieldChange::diff("end_date", "date", date(&before.end_date), date(&after.end_date)),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[async_trait]
impl SubmissionService for SubmissionServiceImpl {
    async fn create_submission(&self, submission: NewSubmission, auth: &AuthContext) -> ServiceResult<ProgramSubmission> {
        auth.authorize(Permission::CreateSubmissions)?;
        submission.validate()?;

        let program = self.program_repo.find_by_id(submission.program_id).await?;
        auth.authorize_agency_access(&program.agency_id)?;
        let period = self.period_repo.find_by_id(submission.period_id).await?;

        let insert = SubmissionInsert {
            program_id: submission.program_id,
            period_id: submission.period_id,
            description: submission.description.clone(),
            created_by_user_id: auth.user_id,
        };

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let created = self
                .repo
                .create_draft_with_tx(&insert, &mut tx)
                .await?
                .ok_or_else(|| DomainError::InvalidState(format!(
                    "Reporting period {} is not open",
                    period.display_name()
                )))?;

            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Create, SubjectType::Submission, Some(created.submission_id))
                .details(format!("Created draft for program {} in {}", program.program_name, period.display_name()));
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;

            Ok::<_, DomainError>(created)
        }
        .await;

        match result {
            Ok(created) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(created)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn get_submission(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<SubmissionDetail> {
        auth.authorize(Permission::ViewSubmissions)?;
        let (submission, _) = self.authorized_submission(id, auth).await?;
        let targets = self.target_repo.find_for_submission(id).await?;
        Ok(SubmissionDetail { submission, targets })
    }

    async fn update_submission(&self, id: Uuid, update: UpdateSubmission, auth: &AuthContext) -> ServiceResult<ProgramSubmission> {
        auth.authorize(Permission::EditSubmissions)?;
        update.validate()?;
        let (before, _) = self.authorized_submission(id, auth).await?;
        let description = apply_text_update(update.description.clone(), &before.description);

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let updated = self
                .repo
                .update_draft_with_tx(id, description.as_deref(), auth.user_id, &mut tx)
                .await?;
            if !updated {
                return Err(DomainError::InvalidState("Only draft submissions can be edited".to_string()));
            }

            if let Some(change) = FieldChange::diff("description", "text", before.description.clone(), description.clone()) {
                let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Update, SubjectType::Submission, Some(id))
                    .details("Updated submission")
                    .with_changes(vec![change]);
                self.audit_repo.create_with_tx(&entry, &mut tx).await?;
            }

            Ok::<_, DomainError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(self.repo.find_by_id(id).await?)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn delete_submission(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<()> {
        auth.authorize(Permission::EditSubmissions)?;
        let (_, program) = self.authorized_submission(id, auth).await?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            self.repo.soft_delete_with_tx(id, auth, &mut tx).await?;
            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Delete, SubjectType::Submission, Some(id))
                .details(format!("Deleted draft of program {}", program.program_name));
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;
            Ok::<_, DomainError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn finalize(&self, id: Uuid, request: FinalizeRequest, auth: &AuthContext) -> ServiceResult<ProgramSubmission> {
        auth.authorize(Permission::FinalizeSubmissions)?;
        let agency_id = auth.require_agency()?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let affected = self
                .repo
                .finalize_with_tx(id, request.program_id, request.period_id, agency_id, auth.user_id, &mut tx)
                .await?;
            if affected == 0 {
                return Err(DomainError::InvalidState(NOT_FINALIZABLE.to_string()));
            }

            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Finalize, SubjectType::Submission, Some(id))
                .details("Submission finalized")
                .with_changes(lifecycle_changes(true));
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;

            Ok::<_, DomainError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                log::info!("Submission {} finalized by {}", id, auth.user_id);
                Ok(self.repo.find_by_id(id).await?)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                if let DomainError::InvalidState(reason) = &e {
                    self.record_failure(AuditAction::Finalize, id, reason, auth).await;
                }
                Err(e.into())
            }
        }
    }

    async fn unsubmit(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<ProgramSubmission> {
        auth.authorize(Permission::UnsubmitSubmissions)?;
        let agency_id = auth.require_agency()?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let affected = self.repo.unsubmit_with_tx(id, agency_id, auth.user_id, &mut tx).await?;
            if affected == 0 {
                // Read the row back to say why
                let current = self.repo.find_by_id_with_tx(id, &mut tx).await?;
                let program = self.program_repo.find_by_id_with_tx(current.program_id, &mut tx).await?;
                if program.agency_id != agency_id {
                    return Err(DomainError::EntityNotFound("Submission".to_string(), id));
                }
                return Err(DomainError::InvalidState(format!(
                    "Submission cannot be unsubmitted: it is currently {}",
                    current.state_description()
                )));
            }

            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Unsubmit, SubjectType::Submission, Some(id))
                .details("Submission returned to draft")
                .with_changes(lifecycle_changes(false));
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;

            Ok::<_, DomainError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                log::info!("Submission {} unsubmitted by {}", id, auth.user_id);
                Ok(self.repo.find_by_id(id).await?)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                if let DomainError::InvalidState(reason) = &e {
                    self.record_failure(AuditAction::Unsubmit, id, reason, auth).await;
                }
                Err(e.into())
            }
        }
    }

    async fn list_for_program(&self, program_id: Uuid, auth: &AuthContext) -> ServiceResult<Vec<ProgramSubmission>> {
        auth.authorize(Permission::ViewSubmissions)?;
        let program = self.program_repo.find_by_id(program_id).await?;
        auth.authorize_agency_access(&program.agency_id)?;
        Ok(self.repo.find_for_program(program_id).await?)
    }

    async fn list_for_period(&self, period_id: Uuid, auth: &AuthContext) -> ServiceResult<Vec<ProgramSubmission>> {
        auth.authorize(Permission::ViewSubmissions)?;
        self.period_repo.find_by_id(period_id).await?;

        let agency_filter = if auth.has_permission(Permission::ReviewSubmissions) {
            None
        } else {
            Some(auth.require_agency()?)
        };
        Ok(self.repo.find_for_period(period_id, agency_filter).await?)
    }

    async fn history(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Vec<AuditLog>> {
        auth.authorize(Permission::ViewSubmissions)?;
        self.authorized_submission(id, auth).await?;
        Ok(self.audit_repo.find_by_subject(SubjectType::Submission, id).await?)
    }

    async fn add_target(&self, submission_id: Uuid, target: NewTarget, auth: &AuthContext) -> ServiceResult<ProgramTarget> {
        auth.authorize(Permission::EditSubmissions)?;
        let fields = TargetFields::from_new(&target)?;
        let (_, program) = self.authorized_submission(submission_id, auth).await?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result: DomainResult<ProgramTarget> = async {
            let existing = self.target_repo.find_numbers_for_submission_with_tx(submission_id, &mut tx).await?;
            let number = next_child_number(program.program_number.as_deref(), existing.iter().map(String::as_str))?;

            let created = self
                .target_repo
                .create_with_tx(submission_id, &number, &fields, &mut tx)
                .await?
                .ok_or_else(|| DomainError::InvalidState(LOCKED_TARGETS.to_string()))?;

            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Create, SubjectType::Target, Some(created.target_id))
                .details(format!("Added target {} to submission {}", created.target_number, submission_id))
                .with_changes(vec![
                    FieldChange::added("target_number", "text", created.target_number.clone()),
                    FieldChange::added("target_description", "text", created.target_description.clone()),
                ]);
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;

            Ok(created)
        }
        .await;

        match result {
            Ok(created) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(created)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn update_target(&self, target_id: Uuid, update: UpdateTarget, auth: &AuthContext) -> ServiceResult<ProgramTarget> {
        auth.authorize(Permission::EditSubmissions)?;
        let before = self.target_repo.find_by_id(target_id).await?;
        self.authorized_submission(before.submission_id, auth).await?;
        let fields = TargetFields::merged(&before, &update)?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            if !self.target_repo.update_with_tx(target_id, &fields, &mut tx).await? {
                return Err(DomainError::InvalidState(LOCKED_TARGETS.to_string()));
            }

            let changes = target_changes(&before, &fields);
            if !changes.is_empty() {
                let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Update, SubjectType::Target, Some(target_id))
                    .details(format!("Updated target {}", before.target_number))
                    .with_changes(changes);
                self.audit_repo.create_with_tx(&entry, &mut tx).await?;
            }

            self.target_repo.find_by_id_with_tx(target_id, &mut tx).await
        }
        .await;

        match result {
            Ok(updated) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(updated)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn delete_target(&self, target_id: Uuid, auth: &AuthContext) -> ServiceResult<()> {
        auth.authorize(Permission::EditSubmissions)?;
        let target = self.target_repo.find_by_id(target_id).await?;
        self.authorized_submission(target.submission_id, auth).await?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            if !self.target_repo.soft_delete_with_tx(target_id, &mut tx).await? {
                return Err(DomainError::InvalidState(LOCKED_TARGETS.to_string()));
            }
            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Delete, SubjectType::Target, Some(target_id))
                .details(format!("Deleted target {}", target.target_number));
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;
            Ok::<_, DomainError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn list_targets(&self, submission_id: Uuid, auth: &AuthContext) -> ServiceResult<Vec<ProgramTarget>> {
        auth.authorize(Permission::ViewSubmissions)?;
        self.authorized_submission(submission_id, auth).await?;
        Ok(self.target_repo.find_for_submission(submission_id).await?)
    }
}
