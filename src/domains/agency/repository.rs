use crate::domains::agency::types::{Agency, AgencyRow, NewAgency};
use crate::domains::audit::{AuditAction, AuditRepository, FieldChange, NewAuditEntry, SubjectType};
use crate::domains::core::FindById;
use crate::auth::AuthContext;
use crate::errors::{DbError, DomainError, DomainResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait AgencyRepository: Send + Sync + FindById<Agency> {
    async fn create(&self, agency: &NewAgency, auth: &AuthContext) -> DomainResult<Agency>;
    async fn find_all(&self) -> DomainResult<Vec<Agency>>;
}

pub struct SqliteAgencyRepository {
    pool: SqlitePool,
    audit_repo: Arc<dyn AuditRepository>,
}

impl SqliteAgencyRepository {
    pub fn new(pool: SqlitePool, audit_repo: Arc<dyn AuditRepository>) -> Self {
        Self { pool, audit_repo }
    }
}

#[async_trait]
impl FindById<Agency> for SqliteAgencyRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Agency> {
        query_as::<_, AgencyRow>("SELECT * FROM agencies WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Agency".to_string(), id))?
            .into_entity()
    }
}

#[async_trait]
impl AgencyRepository for SqliteAgencyRepository {
    async fn create(&self, agency: &NewAgency, auth: &AuthContext) -> DomainResult<Agency> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let name = agency.name.trim().to_string();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            query(
                "INSERT INTO agencies (id, name, abbreviation, is_active, created_at, updated_at)
                 VALUES (?, ?, ?, 1, ?, ?)"
            )
            .bind(id.to_string())
            .bind(&name)
            .bind(&agency.abbreviation)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| match DbError::from(e) {
                err if err.is_unique_violation() => {
                    DomainError::Conflict(format!("Agency {} already exists", name))
                }
                err => DomainError::Database(err),
            })?;

            let entry = NewAuditEntry::new(Some(auth.user_id), AuditAction::Create, SubjectType::Agency, Some(id))
                .details(format!("Created agency {}", name))
                .with_changes(vec![FieldChange::added("name", "text", name.clone())]);
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;

            Ok::<_, DomainError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                self.find_by_id(id).await
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn find_all(&self) -> DomainResult<Vec<Agency>> {
        let rows = query_as::<_, AgencyRow>("SELECT * FROM agencies ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        rows.into_iter().map(AgencyRow::into_entity).collect()
    }
}
