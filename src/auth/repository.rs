use crate::errors::{DbError, DbResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

/// Storage for revoked token ids
#[async_trait]
pub(crate) trait AuthRepository: Send + Sync {
    async fn add_revoked_token(&self, jti: &str, expiry: i64) -> DbResult<()>;
    async fn is_token_revoked(&self, jti: &str) -> DbResult<bool>;
    async fn delete_expired_revoked_tokens(&self) -> DbResult<u64>;
}

pub(crate) struct SqliteAuthRepository {
    pool: SqlitePool,
}

impl SqliteAuthRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthRepository for SqliteAuthRepository {
    async fn add_revoked_token(&self, jti: &str, expiry: i64) -> DbResult<()> {
        // Revoking twice is harmless
        sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, expiry) VALUES (?, ?)")
            .bind(jti)
            .bind(expiry)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn is_token_revoked(&self, jti: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM revoked_tokens WHERE jti = ?")
            .bind(jti)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(count > 0)
    }

    async fn delete_expired_revoked_tokens(&self) -> DbResult<u64> {
        let now = Utc::now().timestamp();
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expiry < ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }
}
