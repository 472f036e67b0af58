use crate::errors::DomainResult;
use crate::types::{double_option, parse_datetime, parse_optional_uuid, parse_uuid};
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A numbered grouping of programs ("1", "2", ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Initiative {
    pub id: Uuid,
    pub name: String,
    pub initiative_number: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInitiative {
    pub name: String,
    pub initiative_number: String,
    pub description: Option<String>,
}

impl Validate for NewInitiative {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .min_length(2)
            .max_length(255)
            .validate()?;

        ValidationBuilder::new("initiative_number", Some(self.initiative_number.trim().to_string()))
            .required()
            .number_token()
            .max_length(20)
            .validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InitiativeRow {
    pub id: String,
    pub name: String,
    pub initiative_number: String,
    pub description: Option<String>,
    pub is_active: i64,
    pub created_at: String,
    pub updated_at: String,
    pub created_by_user_id: Option<String>,
}

impl InitiativeRow {
    pub fn into_entity(self) -> DomainResult<Initiative> {
        Ok(Initiative {
            id: parse_uuid(&self.id)?,
            name: self.name,
            initiative_number: self.initiative_number,
            description: self.description,
            is_active: self.is_active != 0,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            created_by_user_id: parse_optional_uuid(&self.created_by_user_id)?,
        })
    }
}

/// A unit of work an agency reports progress against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub initiative_id: Option<Uuid>,
    pub program_number: Option<String>,
    pub program_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_user_id: Option<Uuid>,
    pub updated_by_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProgram {
    pub program_name: String,
    pub description: Option<String>,
    pub initiative_id: Option<Uuid>,
    /// Explicit number; assigned automatically under the initiative when absent
    pub program_number: Option<String>,
    /// Required for administrators; agency users always create for their own agency
    pub agency_id: Option<Uuid>,
}

impl Validate for NewProgram {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("program_name", Some(self.program_name.clone()))
            .required()
            .min_length(2)
            .max_length(255)
            .validate()?;

        if let Some(number) = &self.program_number {
            ValidationBuilder::new("program_number", Some(number.trim().to_string()))
                .number_token()
                .max_length(20)
                .validate()?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProgram {
    pub program_name: Option<String>,
    /// `Some(None)` clears the description
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
}

impl Validate for UpdateProgram {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.program_name {
            ValidationBuilder::new("program_name", Some(name.clone()))
                .required()
                .min_length(2)
                .max_length(255)
                .validate()?;
        }
        Ok(())
    }
}

/// Fully resolved program row to insert
#[derive(Debug, Clone)]
pub struct ProgramInsert {
    pub agency_id: Uuid,
    pub initiative_id: Option<Uuid>,
    pub program_number: Option<String>,
    pub program_name: String,
    pub description: Option<String>,
    pub created_by_user_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramFilter {
    pub agency_id: Option<Uuid>,
    pub initiative_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProgramRow {
    pub id: String,
    pub agency_id: String,
    pub initiative_id: Option<String>,
    pub program_number: Option<String>,
    pub program_name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub created_by_user_id: Option<String>,
    pub updated_by_user_id: Option<String>,
}

impl ProgramRow {
    pub fn into_entity(self) -> DomainResult<Program> {
        Ok(Program {
            id: parse_uuid(&self.id)?,
            agency_id: parse_uuid(&self.agency_id)?,
            initiative_id: parse_optional_uuid(&self.initiative_id)?,
            program_number: self.program_number,
            program_name: self.program_name,
            description: self.description,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            created_by_user_id: parse_optional_uuid(&self.created_by_user_id)?,
            updated_by_user_id: parse_optional_uuid(&self.updated_by_user_id)?,
        })
    }
}
