use crate::domains::audit::types::{
    AuditFieldChange, AuditFieldChangeRow, AuditLog, AuditLogFilter, AuditLogRow, NewAuditEntry,
    SubjectType,
};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::{PaginatedResult, PaginationParams};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Append-only store for audit logs and their field changes
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Write an audit entry in its own transaction
    async fn create(&self, entry: &NewAuditEntry) -> DomainResult<AuditLog>;

    /// Write an audit entry inside the caller's transaction
    async fn create_with_tx<'t>(
        &self,
        entry: &NewAuditEntry,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<AuditLog>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<AuditLog>;

    /// All entries about one subject, oldest first
    async fn find_by_subject(
        &self,
        subject_type: SubjectType,
        subject_id: Uuid,
    ) -> DomainResult<Vec<AuditLog>>;

    /// Filtered listing, newest first
    async fn list(
        &self,
        filter: &AuditLogFilter,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<AuditLog>>;

    async fn find_changes(&self, audit_log_id: Uuid) -> DomainResult<Vec<AuditFieldChange>>;
}

pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &AuditLogFilter) {
        if let Some(user_id) = filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.to_string());
        }
        if let Some(action) = filter.action {
            builder.push(" AND action = ").push_bind(action.as_str());
        }
        if let Some(subject_type) = filter.subject_type {
            builder.push(" AND subject_type = ").push_bind(subject_type.as_str());
        }
        if let Some(subject_id) = filter.subject_id {
            builder.push(" AND subject_id = ").push_bind(subject_id.to_string());
        }
        if let Some(outcome) = filter.outcome {
            builder.push(" AND outcome = ").push_bind(outcome.as_str());
        }
        if let Some(from) = filter.from {
            builder.push(" AND created_at >= ").push_bind(from.to_rfc3339());
        }
        if let Some(to) = filter.to {
            builder.push(" AND created_at <= ").push_bind(to.to_rfc3339());
        }
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn create(&self, entry: &NewAuditEntry) -> DomainResult<AuditLog> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.create_with_tx(entry, &mut tx).await {
            Ok(log) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(log)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    async fn create_with_tx<'t>(
        &self,
        entry: &NewAuditEntry,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<AuditLog> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        query(
            "INSERT INTO audit_logs (id, user_id, action, subject_type, subject_id, details, outcome, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(id.to_string())
        .bind(entry.user_id.map(|u| u.to_string()))
        .bind(entry.action.as_str())
        .bind(entry.subject_type.as_str())
        .bind(entry.subject_id.map(|s| s.to_string()))
        .bind(&entry.details)
        .bind(entry.outcome.as_str())
        .bind(now.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        for change in &entry.changes {
            query(
                "INSERT INTO audit_field_changes (id, audit_log_id, field_name, field_type, old_value, new_value, change_type)
                 VALUES (?, ?, ?, ?, ?, ?, ?)"
            )
            .bind(Uuid::new_v4().to_string())
            .bind(id.to_string())
            .bind(&change.field_name)
            .bind(&change.field_type)
            .bind(&change.old_value)
            .bind(&change.new_value)
            .bind(change.change_type.as_str())
            .execute(&mut **tx)
            .await
            .map_err(DbError::from)?;
        }

        Ok(AuditLog {
            id,
            user_id: entry.user_id,
            action: entry.action,
            subject_type: entry.subject_type,
            subject_id: entry.subject_id,
            details: entry.details.clone(),
            outcome: entry.outcome,
            created_at: now,
        })
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<AuditLog> {
        query_as::<_, AuditLogRow>("SELECT * FROM audit_logs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("AuditLog".to_string(), id))?
            .into_entity()
    }

    async fn find_by_subject(
        &self,
        subject_type: SubjectType,
        subject_id: Uuid,
    ) -> DomainResult<Vec<AuditLog>> {
        let rows = query_as::<_, AuditLogRow>(
            "SELECT * FROM audit_logs WHERE subject_type = ? AND subject_id = ?
             ORDER BY created_at ASC, rowid ASC"
        )
        .bind(subject_type.as_str())
        .bind(subject_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(AuditLogRow::into_entity).collect()
    }

    async fn list(
        &self,
        filter: &AuditLogFilter,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<AuditLog>> {
        let params = params.normalized();

        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM audit_logs WHERE 1 = 1");
        Self::push_filters(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;

        let mut builder = QueryBuilder::new("SELECT * FROM audit_logs WHERE 1 = 1");
        Self::push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(params.per_page as i64)
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = builder
            .build_query_as::<AuditLogRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(AuditLogRow::into_entity)
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(PaginatedResult::new(items, total as u64, params))
    }

    async fn find_changes(&self, audit_log_id: Uuid) -> DomainResult<Vec<AuditFieldChange>> {
        let rows = query_as::<_, AuditFieldChangeRow>(
            "SELECT * FROM audit_field_changes WHERE audit_log_id = ? ORDER BY rowid ASC"
        )
        .bind(audit_log_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(AuditFieldChangeRow::into_entity).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_migration::initialize_database;
    use crate::domains::audit::types::{AuditAction, AuditOutcome, FieldChange};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SqliteAuditRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();
        SqliteAuditRepository::new(pool)
    }

    #[tokio::test]
    async fn entries_are_found_by_subject_not_by_text() {
        let repo = setup().await;
        let submission = Uuid::new_v4();
        let other = Uuid::new_v4();

        repo.create(
            &NewAuditEntry::new(None, AuditAction::Create, SubjectType::Submission, Some(submission))
                .details(format!("mentions {}", other)),
        )
        .await
        .unwrap();
        repo.create(&NewAuditEntry::new(None, AuditAction::Finalize, SubjectType::Submission, Some(submission)))
            .await
            .unwrap();
        repo.create(&NewAuditEntry::new(None, AuditAction::Create, SubjectType::Submission, Some(other)))
            .await
            .unwrap();

        let history = repo.find_by_subject(SubjectType::Submission, submission).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].action, AuditAction::Finalize);

        let other_history = repo.find_by_subject(SubjectType::Submission, other).await.unwrap();
        assert_eq!(other_history.len(), 1);
    }

    #[tokio::test]
    async fn field_changes_are_stored_with_their_log() {
        let repo = setup().await;
        let target = Uuid::new_v4();
        let change = FieldChange::diff("remarks", "text", Some("old".into()), Some("new".into())).unwrap();

        let log = repo
            .create(
                &NewAuditEntry::new(None, AuditAction::Update, SubjectType::Target, Some(target))
                    .with_changes(vec![change.clone()]),
            )
            .await
            .unwrap();

        let changes = repo.find_changes(log.id).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value.as_deref(), Some("old"));
        assert_eq!(changes[0].new_value.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn list_applies_filters_and_paging() {
        let repo = setup().await;
        for _ in 0..3 {
            repo.create(&NewAuditEntry::new(None, AuditAction::LoginFailed, SubjectType::User, None).failure())
                .await
                .unwrap();
        }
        repo.create(&NewAuditEntry::new(None, AuditAction::Login, SubjectType::User, Some(Uuid::new_v4())))
            .await
            .unwrap();

        let filter = AuditLogFilter {
            outcome: Some(AuditOutcome::Failure),
            ..Default::default()
        };
        let page = repo.list(&filter, PaginationParams { page: 1, per_page: 2 }).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 2);

        let all = repo.list(&AuditLogFilter::default(), PaginationParams::default()).await.unwrap();
        assert_eq!(all.total, 4);
    }
}
