use crate::errors::{DbError, DbResult};
use sqlx::SqlitePool;

// Embed all migration SQL files at compile time
const MIGRATION_INITIAL_SCHEMA: &str = include_str!("../migrations/20251001000000_initial_schema.sql");

// List of migrations with their names and SQL content
const MIGRATIONS: &[(&str, &str)] = &[
    ("20251001000000_initial_schema.sql", MIGRATION_INITIAL_SCHEMA),
];

/// Bring the schema of `pool` up to date
pub async fn initialize_database(pool: &SqlitePool) -> DbResult<()> {
    log::info!("[DB_MIGRATION] Starting database migration process");

    create_migrations_table(pool).await.map_err(|e| {
        log::error!("[DB_MIGRATION] Failed to create migrations table: {}", e);
        e
    })?;

    let last_migration = get_last_migration(pool).await?;
    match &last_migration {
        Some(name) => log::debug!("[DB_MIGRATION] Last applied migration: {}", name),
        None => log::debug!("[DB_MIGRATION] No migrations applied yet"),
    }

    apply_pending_migrations(pool, last_migration).await.map_err(|e| {
        log::error!("[DB_MIGRATION] Failed to apply migrations: {}", e);
        e
    })?;

    log::info!("[DB_MIGRATION] Database migration process completed");
    Ok(())
}

async fn create_migrations_table(pool: &SqlitePool) -> DbResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )"
    )
    .execute(pool)
    .await
    .map_err(|e| DbError::Migration(format!("Failed to create migrations table: {}", e)))?;

    Ok(())
}

async fn get_last_migration(pool: &SqlitePool) -> DbResult<Option<String>> {
    sqlx::query_scalar::<_, String>("SELECT name FROM migrations ORDER BY id DESC LIMIT 1")
        .fetch_optional(pool)
        .await
        .map_err(|e| DbError::Migration(format!("Failed to get last migration: {}", e)))
}

async fn apply_pending_migrations(pool: &SqlitePool, last_migration: Option<String>) -> DbResult<()> {
    let pending_migrations = get_pending_migrations(last_migration.as_deref());

    if pending_migrations.is_empty() {
        log::info!("[DB_MIGRATION] No pending migrations to apply");
        return Ok(());
    }

    log::info!("[DB_MIGRATION] Found {} pending migrations", pending_migrations.len());

    let mut tx = pool.begin().await
        .map_err(|e| DbError::Transaction(format!("Failed to begin migration transaction: {}", e)))?;

    for (migration_name, migration_sql) in pending_migrations {
        log::info!("[DB_MIGRATION] Applying migration: {}", migration_name);

        sqlx::raw_sql(migration_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to apply migration {}: {}", migration_name, e)))?;

        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO migrations (name, applied_at) VALUES (?, ?)")
            .bind(migration_name)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("Failed to record migration {}: {}", migration_name, e)))?;
    }

    tx.commit().await
        .map_err(|e| DbError::Transaction(format!("Failed to commit migrations: {}", e)))?;

    log::info!("[DB_MIGRATION] All migrations applied and committed");
    Ok(())
}

/// Migrations listed after `last_migration`, or all of them on a fresh database
fn get_pending_migrations(last_migration: Option<&str>) -> Vec<(&'static str, &'static str)> {
    let mut pending = Vec::new();
    let mut should_include = last_migration.is_none();

    for &(migration_name, migration_sql) in MIGRATIONS {
        if should_include {
            pending.push((migration_name, migration_sql));
        } else if Some(migration_name) == last_migration {
            should_include = true;
        }
    }

    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn pending_migrations_follow_last_applied() {
        assert_eq!(get_pending_migrations(None).len(), MIGRATIONS.len());
        let last = MIGRATIONS[MIGRATIONS.len() - 1].0;
        assert!(get_pending_migrations(Some(last)).is_empty());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();
        initialize_database(&pool).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }
}
