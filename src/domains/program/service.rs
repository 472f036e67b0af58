use crate::auth::AuthContext;
use crate::domains::agency::AgencyRepository;
use crate::domains::audit::{AuditAction, AuditRepository, FieldChange, NewAuditEntry, SubjectType};
use crate::domains::core::FindById;
use crate::domains::program::numbering::{is_child_number, next_program_number};
use crate::domains::program::repository::{InitiativeRepository, ProgramRepository};
use crate::domains::program::types::{
    Initiative, NewInitiative, NewProgram, Program, ProgramFilter, ProgramInsert, UpdateProgram,
};
use crate::errors::{DbError, DomainError, DomainResult, ServiceError, ServiceResult, ValidationError};
use crate::types::{apply_text_update, Permission};
use crate::validation::Validate;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Attempts at allocating a program number before giving up
const NUMBER_ALLOCATION_ATTEMPTS: usize = 3;

#[async_trait]
pub trait ProgramService: Send + Sync {
    async fn create_initiative(&self, initiative: NewInitiative, auth: &AuthContext) -> ServiceResult<Initiative>;
    async fn get_initiative(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Initiative>;
    async fn list_initiatives(&self, auth: &AuthContext) -> ServiceResult<Vec<Initiative>>;

    /// The number the next program under the initiative would receive
    async fn preview_next_number(&self, initiative_id: Uuid, auth: &AuthContext) -> ServiceResult<String>;

    async fn create_program(&self, program: NewProgram, auth: &AuthContext) -> ServiceResult<Program>;
    async fn get_program(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Program>;
    async fn list_programs(&self, filter: ProgramFilter, auth: &AuthContext) -> ServiceResult<Vec<Program>>;
    async fn update_program(&self, id: Uuid, update: UpdateProgram, auth: &AuthContext) -> ServiceResult<Program>;
}

pub struct ProgramServiceImpl {
    pool: SqlitePool,
    repo: Arc<dyn ProgramRepository>,
    initiative_repo: Arc<dyn InitiativeRepository>,
    agency_repo: Arc<dyn AgencyRepository>,
    audit_repo: Arc<dyn AuditRepository>,
}

enum InsertOutcome {
    Created(Program),
    NumberTaken(String),
}

impl ProgramServiceImpl {
    pub fn new(
        pool: SqlitePool,
        repo: Arc<dyn ProgramRepository>,
        initiative_repo: Arc<dyn InitiativeRepository>,
        agency_repo: Arc<dyn AgencyRepository>,
        audit_repo: Arc<dyn AuditRepository>,
    ) -> Self {
        Self { pool, repo, initiative_repo, agency_repo, audit_repo }
    }

    /// Agency the program is created for
    async fn resolve_agency(&self, requested: Option<Uuid>, auth: &AuthContext) -> ServiceResult<Uuid> {
        let agency_id = if auth.is_admin() {
            requested.ok_or_else(|| ValidationError::required("agency_id"))?
        } else {
            let own = auth.require_agency()?;
            if requested.is_some_and(|requested| requested != own) {
                return Err(ServiceError::PermissionDenied(
                    "Programs can only be created for your own agency".to_string(),
                ));
            }
            own
        };

        match self.agency_repo.find_by_id(agency_id).await {
            Ok(agency) if agency.is_active => Ok(agency_id),
            Ok(_) => Err(ValidationError::relationship("Agency is inactive").into()),
            Err(DomainError::EntityNotFound(_, _)) => Err(ValidationError::relationship("Agency does not exist").into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_initiative(&self, id: Uuid) -> ServiceResult<Initiative> {
        match self.initiative_repo.find_by_id(id).await {
            Ok(initiative) if initiative.is_active => Ok(initiative),
            Ok(_) => Err(ValidationError::relationship("Initiative is inactive").into()),
            Err(DomainError::EntityNotFound(_, _)) => Err(ValidationError::relationship("Initiative does not exist").into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert in one transaction, reporting a program number collision separately
    async fn try_insert(
        &self,
        insert: ProgramInsert,
        initiative: Option<&Initiative>,
    ) -> ServiceResult<InsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let mut insert = insert;
            if let (Some(initiative), None) = (initiative, insert.program_number.as_ref()) {
                let existing = self.repo.find_numbers_under_with_tx(&initiative.initiative_number, &mut tx).await?;
                insert.program_number = Some(next_program_number(
                    &initiative.initiative_number,
                    existing.iter().map(String::as_str),
                )?);
            }

            let program = match self.repo.create_with_tx(&insert, &mut tx).await {
                Ok(program) => program,
                Err(DomainError::Database(err)) if err.is_unique_violation() => {
                    return Ok(InsertOutcome::NumberTaken(insert.program_number.unwrap_or_default()));
                }
                Err(e) => return Err(e),
            };

            let mut changes = vec![FieldChange::added("program_name", "text", program.program_name.clone())];
            if let Some(number) = &program.program_number {
                changes.push(FieldChange::added("program_number", "text", number.clone()));
            }
            let entry = NewAuditEntry::new(Some(insert.created_by_user_id), AuditAction::Create, SubjectType::Program, Some(program.id))
                .details(format!("Created program {}", program.program_name))
                .with_changes(changes);
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;

            Ok::<_, DomainError>(InsertOutcome::Created(program))
        }
        .await;

        match result {
            Ok(InsertOutcome::Created(program)) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(InsertOutcome::Created(program))
            }
            Ok(taken) => {
                let _ = tx.rollback().await;
                Ok(taken)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }

    async fn authorized_program(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Program> {
        let program = self.repo.find_by_id(id).await?;
        auth.authorize_agency_access(&program.agency_id)?;
        Ok(program)
    }
}

#[async_trait]
impl ProgramService for ProgramServiceImpl {
    async fn create_initiative(&self, initiative: NewInitiative, auth: &AuthContext) -> ServiceResult<Initiative> {
        auth.authorize(Permission::ManageInitiatives)?;
        initiative.validate()?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let created = self.initiative_repo.create_with_tx(&initiative, auth.user_id, &mut tx).await?;
            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Create, SubjectType::Initiative, Some(created.id))
                .details(format!("Created initiative {} {}", created.initiative_number, created.name))
                .with_changes(vec![FieldChange::added("initiative_number", "text", created.initiative_number.clone())]);
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

    async fn get_initiative(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Initiative> {
        auth.authorize(Permission::ViewPrograms)?;
        Ok(self.initiative_repo.find_by_id(id).await?)
    }

    async fn list_initiatives(&self, auth: &AuthContext) -> ServiceResult<Vec<Initiative>> {
        auth.authorize(Permission::ViewPrograms)?;
        Ok(self.initiative_repo.find_all().await?)
    }

    async fn preview_next_number(&self, initiative_id: Uuid, auth: &AuthContext) -> ServiceResult<String> {
        auth.authorize(Permission::ViewPrograms)?;
        let initiative = self.initiative_repo.find_by_id(initiative_id).await?;
        let existing = self.repo.find_numbers_under(&initiative.initiative_number).await?;
        Ok(next_program_number(&initiative.initiative_number, existing.iter().map(String::as_str))?)
    }

    async fn create_program(&self, program: NewProgram, auth: &AuthContext) -> ServiceResult<Program> {
        auth.authorize(Permission::CreatePrograms)?;
        program.validate()?;

        let agency_id = self.resolve_agency(program.agency_id, auth).await?;
        let initiative = match program.initiative_id {
            Some(id) => Some(self.load_initiative(id).await?),
            None => None,
        };

        let explicit_number = program
            .program_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        if let (Some(number), Some(initiative)) = (&explicit_number, &initiative) {
            if !is_child_number(&initiative.initiative_number, number)? {
                return Err(ValidationError::format(
                    "program_number",
                    &format!("must be {}.<n> for initiative {}", initiative.initiative_number, initiative.initiative_number),
                )
                .into());
            }
        }

        let insert = ProgramInsert {
            agency_id,
            initiative_id: initiative.as_ref().map(|i| i.id),
            program_number: explicit_number.clone(),
            program_name: program.program_name.trim().to_string(),
            description: program.description.clone(),
            created_by_user_id: auth.user_id,
        };

        // An explicit number is the caller's choice; only generated numbers are retried
        let attempts = if explicit_number.is_some() || initiative.is_none() {
            1
        } else {
            NUMBER_ALLOCATION_ATTEMPTS
        };

        for attempt in 1..=attempts {
            match self.try_insert(insert.clone(), initiative.as_ref()).await? {
                InsertOutcome::Created(created) => {
                    log::info!(
                        "Program {} ({}) created by {}",
                        created.id,
                        created.program_number.as_deref().unwrap_or("unnumbered"),
                        auth.user_id
                    );
                    return Ok(created);
                }
                InsertOutcome::NumberTaken(number) if explicit_number.is_some() => {
                    return Err(DomainError::Conflict(format!("Program number {} is already in use", number)).into());
                }
                InsertOutcome::NumberTaken(number) => {
                    log::warn!("Program number {} taken concurrently (attempt {}/{})", number, attempt, attempts);
                }
            }
        }

        Err(DomainError::Conflict("Could not allocate a program number, please retry".to_string()).into())
    }

    async fn get_program(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Program> {
        auth.authorize(Permission::ViewPrograms)?;
        self.authorized_program(id, auth).await
    }

    async fn list_programs(&self, filter: ProgramFilter, auth: &AuthContext) -> ServiceResult<Vec<Program>> {
        auth.authorize(Permission::ViewPrograms)?;
        let filter = if auth.is_admin() {
            filter
        } else {
            ProgramFilter { agency_id: Some(auth.require_agency()?), ..filter }
        };
        Ok(self.repo.find_all(&filter).await?)
    }

    async fn update_program(&self, id: Uuid, update: UpdateProgram, auth: &AuthContext) -> ServiceResult<Program> {
        auth.authorize(Permission::EditPrograms)?;
        update.validate()?;

        let before = self.authorized_program(id, auth).await?;
        let program_name = update.program_name.clone().unwrap_or_else(|| before.program_name.clone());
        let description = apply_text_update(update.description.clone(), &before.description);

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result: DomainResult<Program> = async {
            let after = self
                .repo
                .update_with_tx(id, &program_name, description.as_deref(), auth.user_id, &mut tx)
                .await?;

            let changes: Vec<FieldChange> = [
                FieldChange::diff("program_name", "text", Some(before.program_name.clone()), Some(after.program_name.clone())),
                FieldChange::diff("description", "text", before.description.clone(), after.description.clone()),
            ]
            .into_iter()
            .flatten()
            .collect();

            if !changes.is_empty() {
                let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Update, SubjectType::Program, Some(id))
                    .details(format!("Updated program {}", after.program_name))
                    .with_changes(changes);
                self.audit_repo.create_with_tx(&entry, &mut tx).await?;
            }

            Ok(after)
        }
        .await;

        match result {
            Ok(after) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(after)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e.into())
            }
        }
    }
}
