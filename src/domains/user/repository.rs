use crate::errors::{DbError, DomainError, DomainResult, ValidationError};
use crate::domains::user::types::{NewUser, User, UserRow};
use crate::domains::audit::{AuditAction, AuditRepository, FieldChange, NewAuditEntry, SubjectType};
use crate::domains::core::FindById;
use crate::auth::AuthContext;
use uuid::Uuid;
use chrono::Utc;
use sqlx::{SqlitePool, query, query_as, query_scalar};
use async_trait::async_trait;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync + FindById<User> {
    /// Find a user by email; `None` when no account uses it
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>>;

    async fn find_all(&self) -> DomainResult<Vec<User>>;

    async fn count(&self) -> DomainResult<i64>;

    /// Create a new user; `user.password` must already be hashed
    async fn create(&self, user: NewUser, auth: &AuthContext) -> DomainResult<User>;

    async fn update_last_login(&self, id: Uuid) -> DomainResult<()>;

    async fn is_email_unique(&self, email: &str) -> DomainResult<bool>;
}

/// SQLite implementation of UserRepository
pub struct SqliteUserRepository {
    pool: SqlitePool,
    audit_repo: Arc<dyn AuditRepository>,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool, audit_repo: Arc<dyn AuditRepository>) -> Self {
        Self { pool, audit_repo }
    }
}

/// The system context has a nil user id; store it as NULL
fn actor_id(auth: &AuthContext) -> Option<Uuid> {
    (!auth.user_id.is_nil()).then_some(auth.user_id)
}

#[async_trait]
impl FindById<User> for SqliteUserRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<User> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("User".to_string(), id))?
            .into_entity()
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE email = ? COLLATE NOCASE")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .map(UserRow::into_entity)
            .transpose()
    }

    async fn find_all(&self) -> DomainResult<Vec<User>> {
        let rows = query_as::<_, UserRow>("SELECT * FROM users ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        rows.into_iter().map(UserRow::into_entity).collect()
    }

    async fn count(&self) -> DomainResult<i64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(count)
    }

    async fn create(&self, user: NewUser, auth: &AuthContext) -> DomainResult<User> {
        if !self.is_email_unique(&user.email).await? {
            return Err(DomainError::Validation(ValidationError::unique("email")));
        }
        let role = user.parsed_role()?;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let create_result = async {
            let id = Uuid::new_v4();
            let now = Utc::now().to_rfc3339();
            let actor = actor_id(auth);

            query(
                "INSERT INTO users (
                    id, email, name, password_hash, role, agency_id, active,
                    created_at, updated_at, created_by_user_id
                 ) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?)"
            )
            .bind(id.to_string())
            .bind(user.email.trim())
            .bind(user.name.trim())
            .bind(&user.password)
            .bind(role.as_str())
            .bind(user.agency_id.map(|a| a.to_string()))
            .bind(&now)
            .bind(&now)
            .bind(actor.map(|a| a.to_string()))
            .execute(&mut *tx)
            .await
            .map_err(|e| match DbError::from(e) {
                err if err.is_unique_violation() => DomainError::Validation(ValidationError::unique("email")),
                err => DomainError::Database(err),
            })?;

            let mut changes = vec![
                FieldChange::added("email", "text", user.email.trim()),
                FieldChange::added("role", "text", role.as_str()),
            ];
            if let Some(agency_id) = user.agency_id {
                changes.push(FieldChange::added("agency_id", "uuid", agency_id.to_string()));
            }
            let entry = NewAuditEntry::new(actor, AuditAction::Create, SubjectType::User, Some(id))
                .details(format!("Created {} account {}", role.as_str(), user.email.trim()))
                .with_changes(changes);
            self.audit_repo.create_with_tx(&entry, &mut tx).await?;

            Ok::<_, DomainError>(id)
        }
        .await;

        match create_result {
            Ok(id) => {
                tx.commit().await.map_err(DbError::from)?;
                self.find_by_id(id).await
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn update_last_login(&self, id: Uuid) -> DomainResult<()> {
        query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn is_email_unique(&self, email: &str) -> DomainResult<bool> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ? COLLATE NOCASE")
            .bind(email.trim())
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(count == 0)
    }
}
