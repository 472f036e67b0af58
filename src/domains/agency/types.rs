use crate::errors::DomainResult;
use crate::types::{parse_datetime, parse_uuid};
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An organisational unit that owns programs and reports on them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agency {
    pub id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgency {
    pub name: String,
    pub abbreviation: Option<String>,
}

impl Validate for NewAgency {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .min_length(2)
            .max_length(255)
            .validate()?;

        if let Some(abbreviation) = &self.abbreviation {
            ValidationBuilder::new("abbreviation", Some(abbreviation.clone()))
                .max_length(32)
                .validate()?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AgencyRow {
    pub id: String,
    pub name: String,
    pub abbreviation: Option<String>,
    pub is_active: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl AgencyRow {
    pub fn into_entity(self) -> DomainResult<Agency> {
        Ok(Agency {
            id: parse_uuid(&self.id)?,
            name: self.name,
            abbreviation: self.abbreviation,
            is_active: self.is_active != 0,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}
