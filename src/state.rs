use crate::auth::{AuthService, JwtManager};
use crate::config::AppConfig;
use crate::db_migration::initialize_database;
use crate::domains::agency::{AgencyRepository, AgencyService, AgencyServiceImpl, SqliteAgencyRepository};
use crate::domains::audit::{AuditRepository, AuditService, AuditServiceImpl, SqliteAuditRepository};
use crate::domains::period::{PeriodRepository, PeriodService, PeriodServiceImpl, SqlitePeriodRepository};
use crate::domains::program::{
    InitiativeRepository, ProgramRepository, ProgramService, ProgramServiceImpl,
    SqliteInitiativeRepository, SqliteProgramRepository,
};
use crate::domains::submission::{
    SqliteSubmissionRepository, SqliteTargetRepository, SubmissionRepository, SubmissionService,
    SubmissionServiceImpl, TargetRepository,
};
use crate::domains::user::{SqliteUserRepository, UserRepository, UserService, UserServiceImpl};
use crate::errors::{DbError, ServiceResult};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Services shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserService>,
    pub agencies: Arc<dyn AgencyService>,
    pub periods: Arc<dyn PeriodService>,
    pub programs: Arc<dyn ProgramService>,
    pub submissions: Arc<dyn SubmissionService>,
    pub audit: Arc<dyn AuditService>,
}

impl AppState {
    /// Connect, migrate, wire the services and create the bootstrap admin if configured
    pub async fn initialize(config: &AppConfig) -> ServiceResult<Self> {
        log::info!("Starting initialization");
        log::debug!("Database URL: {}", config.database_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                log::error!("Database connection failed: {}", e);
                DbError::from(e)
            })?;

        initialize_database(&pool).await?;

        let state = Self::from_pool(pool, &config.jwt_secret);

        if let Some((email, password)) = &config.bootstrap_admin {
            state.users.ensure_bootstrap_admin(email, password).await?;
        }

        log::info!("Initialization complete");
        Ok(state)
    }

    /// Wire repositories and services over an already migrated pool
    pub fn from_pool(pool: SqlitePool, jwt_secret: &str) -> Self {
        let audit_repo: Arc<dyn AuditRepository> = Arc::new(SqliteAuditRepository::new(pool.clone()));
        let user_repo: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(pool.clone(), audit_repo.clone()));
        let agency_repo: Arc<dyn AgencyRepository> =
            Arc::new(SqliteAgencyRepository::new(pool.clone(), audit_repo.clone()));
        let period_repo: Arc<dyn PeriodRepository> = Arc::new(SqlitePeriodRepository::new(pool.clone()));
        let initiative_repo: Arc<dyn InitiativeRepository> =
            Arc::new(SqliteInitiativeRepository::new(pool.clone()));
        let program_repo: Arc<dyn ProgramRepository> = Arc::new(SqliteProgramRepository::new(pool.clone()));
        let submission_repo: Arc<dyn SubmissionRepository> =
            Arc::new(SqliteSubmissionRepository::new(pool.clone()));
        let target_repo: Arc<dyn TargetRepository> = Arc::new(SqliteTargetRepository::new(pool.clone()));

        let auth = Arc::new(AuthService::new(
            pool.clone(),
            user_repo.clone(),
            audit_repo.clone(),
            JwtManager::new(jwt_secret),
        ));

        let users: Arc<dyn UserService> =
            Arc::new(UserServiceImpl::new(user_repo, agency_repo.clone(), auth.clone()));
        let agencies: Arc<dyn AgencyService> = Arc::new(AgencyServiceImpl::new(agency_repo.clone()));
        let periods: Arc<dyn PeriodService> = Arc::new(PeriodServiceImpl::new(
            pool.clone(),
            period_repo.clone(),
            audit_repo.clone(),
        ));
        let programs: Arc<dyn ProgramService> = Arc::new(ProgramServiceImpl::new(
            pool.clone(),
            program_repo.clone(),
            initiative_repo,
            agency_repo,
            audit_repo.clone(),
        ));
        let submissions: Arc<dyn SubmissionService> = Arc::new(SubmissionServiceImpl::new(
            pool.clone(),
            submission_repo,
            target_repo,
            program_repo,
            period_repo,
            audit_repo.clone(),
        ));
        let audit: Arc<dyn AuditService> = Arc::new(AuditServiceImpl::new(audit_repo));

        Self { pool, auth, users, agencies, periods, programs, submissions, audit }
    }
}
