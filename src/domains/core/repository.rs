use crate::errors::DomainResult;
use crate::auth::AuthContext;
use uuid::Uuid;
use async_trait::async_trait;
use sqlx::{Transaction, Sqlite};

/// Trait for finding entities by ID
#[async_trait]
pub trait FindById<T> {
    /// Find an entity by ID; soft-deleted rows are reported as not found
    async fn find_by_id(&self, id: Uuid) -> DomainResult<T>;
}

/// Trait for entities that are flagged deleted instead of removed
#[async_trait]
pub trait SoftDeletable {
    /// Soft delete an entity by ID within the caller's transaction
    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        auth: &AuthContext,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}
