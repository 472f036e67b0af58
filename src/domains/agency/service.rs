use crate::auth::AuthContext;
use crate::domains::agency::repository::AgencyRepository;
use crate::domains::agency::types::{Agency, NewAgency};
use crate::domains::core::FindById;
use crate::errors::ServiceResult;
use crate::types::Permission;
use crate::validation::Validate;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait AgencyService: Send + Sync {
    async fn create_agency(&self, agency: NewAgency, auth: &AuthContext) -> ServiceResult<Agency>;
    async fn get_agency(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Agency>;
    /// Administrators see every agency, agency users only their own
    async fn list_agencies(&self, auth: &AuthContext) -> ServiceResult<Vec<Agency>>;
}

pub struct AgencyServiceImpl {
    repo: Arc<dyn AgencyRepository>,
}

impl AgencyServiceImpl {
    pub fn new(repo: Arc<dyn AgencyRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl AgencyService for AgencyServiceImpl {
    async fn create_agency(&self, agency: NewAgency, auth: &AuthContext) -> ServiceResult<Agency> {
        auth.authorize(Permission::ManageAgencies)?;
        agency.validate()?;

        let created = self.repo.create(&agency, auth).await?;
        log::info!("Agency {} created by {}", created.id, auth.user_id);
        Ok(created)
    }

    async fn get_agency(&self, id: Uuid, auth: &AuthContext) -> ServiceResult<Agency> {
        auth.authorize_agency_access(&id)?;
        Ok(self.repo.find_by_id(id).await?)
    }

    async fn list_agencies(&self, auth: &AuthContext) -> ServiceResult<Vec<Agency>> {
        if auth.has_permission(Permission::ManageAgencies) {
            return Ok(self.repo.find_all().await?);
        }
        let agency_id = auth.require_agency()?;
        Ok(vec![self.repo.find_by_id(agency_id).await?])
    }
}
