use crate::domains::core::FindById;
use crate::domains::program::types::{
    Initiative, InitiativeRow, NewInitiative, Program, ProgramFilter, ProgramInsert, ProgramRow,
};
use crate::errors::{DbError, DomainError, DomainResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, QueryBuilder, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

#[async_trait]
pub trait InitiativeRepository: Send + Sync + FindById<Initiative> {
    async fn create_with_tx<'t>(
        &self,
        initiative: &NewInitiative,
        created_by: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Initiative>;

    async fn find_all(&self) -> DomainResult<Vec<Initiative>>;
}

#[async_trait]
pub trait ProgramRepository: Send + Sync + FindById<Program> {
    async fn find_by_id_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Program>;

    /// Numbers of the form `<parent>.<...>` held by any program, linked to
    /// the initiative numbered `parent` or not
    async fn find_numbers_under_with_tx<'t>(
        &self,
        parent: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Vec<String>>;

    async fn find_numbers_under(&self, parent: &str) -> DomainResult<Vec<String>>;

    /// Insert a program. Unique violations surface as `DomainError::Database`
    /// so callers can tell a number collision from other failures.
    async fn create_with_tx<'t>(
        &self,
        program: &ProgramInsert,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Program>;

    async fn update_with_tx<'t>(
        &self,
        id: Uuid,
        program_name: &str,
        description: Option<&str>,
        updated_by: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Program>;

    async fn find_all(&self, filter: &ProgramFilter) -> DomainResult<Vec<Program>>;
}

pub struct SqliteInitiativeRepository {
    pool: SqlitePool,
}

impl SqliteInitiativeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FindById<Initiative> for SqliteInitiativeRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Initiative> {
        query_as::<_, InitiativeRow>("SELECT * FROM initiatives WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Initiative".to_string(), id))?
            .into_entity()
    }
}

#[async_trait]
impl InitiativeRepository for SqliteInitiativeRepository {
    async fn create_with_tx<'t>(
        &self,
        initiative: &NewInitiative,
        created_by: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Initiative> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let number = initiative.initiative_number.trim();

        query(
            "INSERT INTO initiatives (id, name, initiative_number, description, is_active, created_at, updated_at, created_by_user_id)
             VALUES (?, ?, ?, ?, 1, ?, ?, ?)"
        )
        .bind(id.to_string())
        .bind(initiative.name.trim())
        .bind(number)
        .bind(&initiative.description)
        .bind(&now)
        .bind(&now)
        .bind(created_by.to_string())
        .execute(&mut **tx)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_violation() => {
                DomainError::Conflict(format!("Initiative number {} is already in use", number))
            }
            err => DomainError::Database(err),
        })?;

        query_as::<_, InitiativeRow>("SELECT * FROM initiatives WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&mut **tx)
            .await
            .map_err(DbError::from)?
            .into_entity()
    }

    async fn find_all(&self) -> DomainResult<Vec<Initiative>> {
        // Numeric ordering of dotted numbers: "2" before "10"
        let rows = query_as::<_, InitiativeRow>(
            "SELECT * FROM initiatives ORDER BY CAST(initiative_number AS INTEGER) ASC, initiative_number ASC"
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(InitiativeRow::into_entity).collect()
    }
}

pub struct SqliteProgramRepository {
    pool: SqlitePool,
}

impl SqliteProgramRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FindById<Program> for SqliteProgramRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Program> {
        query_as::<_, ProgramRow>("SELECT * FROM programs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Program".to_string(), id))?
            .into_entity()
    }
}

// LIKE narrows the scan; the numbering regex does the exact match
const SELECT_NUMBERS_UNDER: &str = "SELECT program_number FROM programs WHERE program_number LIKE ?";

/// Initiative numbers are digits and dots, so they carry no LIKE wildcards
fn number_prefix_pattern(parent: &str) -> String {
    format!("{}.%", parent.trim())
}

#[async_trait]
impl ProgramRepository for SqliteProgramRepository {
    async fn find_by_id_with_tx<'t>(
        &self,
        id: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Program> {
        query_as::<_, ProgramRow>("SELECT * FROM programs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Program".to_string(), id))?
            .into_entity()
    }

    async fn find_numbers_under_with_tx<'t>(
        &self,
        parent: &str,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Vec<String>> {
        let numbers = query_scalar::<_, String>(SELECT_NUMBERS_UNDER)
            .bind(number_prefix_pattern(parent))
            .fetch_all(&mut **tx)
            .await
            .map_err(DbError::from)?;
        Ok(numbers)
    }

    async fn find_numbers_under(&self, parent: &str) -> DomainResult<Vec<String>> {
        let numbers = query_scalar::<_, String>(SELECT_NUMBERS_UNDER)
            .bind(number_prefix_pattern(parent))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(numbers)
    }

    async fn create_with_tx<'t>(
        &self,
        program: &ProgramInsert,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Program> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            "INSERT INTO programs (
                id, agency_id, initiative_id, program_number, program_name, description,
                created_at, updated_at, created_by_user_id, updated_by_user_id
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(id.to_string())
        .bind(program.agency_id.to_string())
        .bind(program.initiative_id.map(|i| i.to_string()))
        .bind(&program.program_number)
        .bind(program.program_name.trim())
        .bind(&program.description)
        .bind(&now)
        .bind(&now)
        .bind(program.created_by_user_id.to_string())
        .bind(program.created_by_user_id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        self.find_by_id_with_tx(id, tx).await
    }

    async fn update_with_tx<'t>(
        &self,
        id: Uuid,
        program_name: &str,
        description: Option<&str>,
        updated_by: Uuid,
        tx: &mut Transaction<'t, Sqlite>,
    ) -> DomainResult<Program> {
        let result = query(
            "UPDATE programs SET program_name = ?, description = ?, updated_at = ?, updated_by_user_id = ?
             WHERE id = ?"
        )
        .bind(program_name.trim())
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .bind(updated_by.to_string())
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EntityNotFound("Program".to_string(), id));
        }

        self.find_by_id_with_tx(id, tx).await
    }

    async fn find_all(&self, filter: &ProgramFilter) -> DomainResult<Vec<Program>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM programs WHERE 1 = 1");
        if let Some(agency_id) = filter.agency_id {
            builder.push(" AND agency_id = ").push_bind(agency_id.to_string());
        }
        if let Some(initiative_id) = filter.initiative_id {
            builder.push(" AND initiative_id = ").push_bind(initiative_id.to_string());
        }
        builder.push(" ORDER BY program_number IS NULL, program_number ASC, program_name ASC");

        let rows = builder
            .build_query_as::<ProgramRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        rows.into_iter().map(ProgramRow::into_entity).collect()
    }
}
