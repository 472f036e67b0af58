use crate::errors::{DomainError, ServiceError, ServiceResult, ValidationError};
use crate::domains::user::types::{NewUser, User, UserResponse};
use crate::domains::user::repository::UserRepository;
use crate::domains::agency::AgencyRepository;
use crate::domains::core::FindById;
use crate::auth::{AuthContext, AuthService};
use crate::types::Permission;
use crate::validation::Validate;
use async_trait::async_trait;
use uuid::Uuid;
use std::sync::Arc;

#[async_trait]
pub trait UserService: Send + Sync {
    async fn create_user(&self, user: NewUser, auth: &AuthContext) -> ServiceResult<UserResponse>;
    async fn get_user(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<UserResponse>;
    async fn list_users(&self, auth: &AuthContext) -> ServiceResult<Vec<UserResponse>>;

    /// Create the first administrator when the users table is empty.
    /// Returns the created account, or `None` when users already exist.
    async fn ensure_bootstrap_admin(&self, email: &str, password: &str) -> ServiceResult<Option<User>>;
}

/// Service for user-related operations
pub struct UserServiceImpl {
    user_repo: Arc<dyn UserRepository>,
    agency_repo: Arc<dyn AgencyRepository>,
    auth_service: Arc<AuthService>,
}

impl UserServiceImpl {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        agency_repo: Arc<dyn AgencyRepository>,
        auth_service: Arc<AuthService>,
    ) -> Self {
        Self { user_repo, agency_repo, auth_service }
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn create_user(&self, user: NewUser, auth: &AuthContext) -> ServiceResult<UserResponse> {
        auth.authorize(Permission::ManageUsers)?;
        user.validate()?;

        if let Some(agency_id) = user.agency_id {
            match self.agency_repo.find_by_id(agency_id).await {
                Ok(agency) if agency.is_active => {}
                Ok(_) => {
                    return Err(ValidationError::relationship("Cannot attach a user to an inactive agency").into())
                }
                Err(DomainError::EntityNotFound(_, _)) => {
                    return Err(ValidationError::relationship("Agency does not exist").into())
                }
                Err(e) => return Err(e.into()),
            }
        }

        let password_hash = self.auth_service.hash_password(&user.password)?;
        let user_with_hash = NewUser { password: password_hash, ..user };

        let created = self.user_repo.create(user_with_hash, auth).await?;
        log::info!("User {} ({}) created by {}", created.id, created.role.as_str(), auth.user_id);
        Ok(created.into())
    }

    async fn get_user(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<UserResponse> {
        // Everyone may read their own account
        if id != auth.user_id {
            auth.authorize(Permission::ManageUsers)?;
        }
        Ok(self.user_repo.find_by_id(id).await?.into())
    }

    async fn list_users(&self, auth: &AuthContext) -> ServiceResult<Vec<UserResponse>> {
        auth.authorize(Permission::ManageUsers)?;
        let users = self.user_repo.find_all().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    async fn ensure_bootstrap_admin(&self, email: &str, password: &str) -> ServiceResult<Option<User>> {
        if self.user_repo.count().await? > 0 {
            log::debug!("Users already present, skipping bootstrap admin");
            return Ok(None);
        }

        let admin = NewUser {
            email: email.to_string(),
            password: password.to_string(),
            name: "System Administrator".to_string(),
            role: "admin".to_string(),
            agency_id: None,
        };
        admin.validate().map_err(|e| {
            ServiceError::Configuration(format!("Invalid bootstrap admin credentials: {}", e))
        })?;

        let password_hash = self.auth_service.hash_password(&admin.password)?;
        let admin = NewUser { password: password_hash, ..admin };

        let system = AuthContext::internal_system_context();
        let created = self.user_repo.create(admin, &system).await?;
        log::info!("Bootstrap administrator {} created", created.email);
        Ok(Some(created))
    }
}
