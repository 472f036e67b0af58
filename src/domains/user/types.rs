use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::validation::{common, Validate, ValidationBuilder};
use crate::types::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid, UserRole};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use sqlx::FromRow;

/// Core User entity - represents a portal account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub agency_id: Option<Uuid>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_user_id: Option<Uuid>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

/// NewUser DTO - used when creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String, // Plain text password (hashed by the service)
    pub name: String,
    pub role: String,
    pub agency_id: Option<Uuid>,
}

impl NewUser {
    pub fn parsed_role(&self) -> DomainResult<UserRole> {
        UserRole::from_str(&self.role)
            .ok_or_else(|| DomainError::Validation(ValidationError::invalid_value("role", "Invalid role")))
    }
}

impl Validate for NewUser {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("email", Some(self.email.clone()))
            .required()
            .email()
            .validate()?;

        common::validate_password_strength(&self.password)?;

        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .min_length(2)
            .max_length(100)
            .validate()?;

        ValidationBuilder::new("role", Some(self.role.clone()))
            .required()
            .one_of(&["admin", "agency", "focal"], Some("Invalid role"))
            .validate()?;

        // Agency-side accounts report for exactly one agency; admins for none
        let role = self.parsed_role()?;
        match (role.requires_agency(), self.agency_id) {
            (true, None) => Err(DomainError::Validation(ValidationError::required("agency_id"))),
            (false, Some(_)) => Err(DomainError::Validation(ValidationError::invalid_value(
                "agency_id",
                "administrators are not attached to an agency",
            ))),
            _ => Ok(()),
        }
    }
}

/// Credentials DTO - used for login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Validate for Credentials {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("email", Some(self.email.clone()))
            .required()
            .email()
            .validate()?;

        ValidationBuilder::new("password", Some(self.password.clone()))
            .required()
            .validate()?;

        Ok(())
    }
}

/// UserRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub agency_id: Option<String>,
    pub active: i64,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub created_by_user_id: Option<String>,
}

impl UserRow {
    pub fn into_entity(self) -> DomainResult<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            role: UserRole::from_str(&self.role)
                .ok_or_else(|| DomainError::Internal(format!("Invalid role: {}", self.role)))?,
            agency_id: parse_optional_uuid(&self.agency_id)?,
            active: self.active != 0,
            last_login: parse_optional_datetime(&self.last_login)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            created_by_user_id: parse_optional_uuid(&self.created_by_user_id)?,
        })
    }
}

/// UserResponse DTO - used for API responses, never carries the hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub agency_id: Option<Uuid>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            agency_id: user.agency_id,
            active: user.active,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(role: &str, agency_id: Option<Uuid>) -> NewUser {
        NewUser {
            email: "officer@agency.gov".to_string(),
            password: "Reporting2025".to_string(),
            name: "Reporting Officer".to_string(),
            role: role.to_string(),
            agency_id,
        }
    }

    #[test]
    fn agency_roles_need_an_agency() {
        assert!(new_user("agency", Some(Uuid::new_v4())).validate().is_ok());
        assert!(new_user("focal", None).validate().is_err());
        assert!(new_user("admin", None).validate().is_ok());
        assert!(new_user("admin", Some(Uuid::new_v4())).validate().is_err());
    }

    #[test]
    fn unknown_roles_are_rejected() {
        assert!(new_user("field_tl", None).validate().is_err());
    }
}
