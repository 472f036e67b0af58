use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::types::{double_option, parse_datetime, parse_optional_date, parse_optional_datetime, parse_optional_uuid, parse_uuid, parse_date};
use crate::validation::{validate_optional_date_range, Validate, ValidationBuilder};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Progress of a target within the reporting period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIndicator {
    NotStarted,
    InProgress,
    Delayed,
    Completed,
}

impl StatusIndicator {
    pub const ALLOWED: [&'static str; 4] = ["not_started", "in_progress", "delayed", "completed"];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusIndicator::NotStarted => "not_started",
            StatusIndicator::InProgress => "in_progress",
            StatusIndicator::Delayed => "delayed",
            StatusIndicator::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(StatusIndicator::NotStarted),
            "in_progress" => Some(StatusIndicator::InProgress),
            "delayed" => Some(StatusIndicator::Delayed),
            "completed" => Some(StatusIndicator::Completed),
            _ => None,
        }
    }
}

/// An agency's report on one program for one reporting period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSubmission {
    pub submission_id: Uuid,
    pub program_id: Uuid,
    pub period_id: Uuid,
    pub is_draft: bool,
    pub is_submitted: bool,
    pub submitted_by: Option<Uuid>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_user_id: Option<Uuid>,
    pub updated_by_user_id: Option<Uuid>,
}

impl ProgramSubmission {
    /// Lifecycle state with its raw flags, e.g. `a draft (is_draft=1, is_submitted=0)`
    pub fn state_description(&self) -> String {
        let state = if self.is_deleted {
            "deleted"
        } else if self.is_draft {
            "a draft"
        } else if self.is_submitted {
            "finalized"
        } else {
            "in an unknown state"
        };
        format!(
            "{} (is_draft={}, is_submitted={})",
            state, self.is_draft as u8, self.is_submitted as u8
        )
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRow {
    pub submission_id: String,
    pub program_id: String,
    pub period_id: String,
    pub is_draft: i64,
    pub is_submitted: i64,
    pub submitted_by: Option<String>,
    pub submitted_at: Option<String>,
    pub description: Option<String>,
    pub is_deleted: i64,
    pub created_at: String,
    pub updated_at: String,
    pub created_by_user_id: Option<String>,
    pub updated_by_user_id: Option<String>,
}

impl SubmissionRow {
    pub fn into_entity(self) -> DomainResult<ProgramSubmission> {
        Ok(ProgramSubmission {
            submission_id: parse_uuid(&self.submission_id)?,
            program_id: parse_uuid(&self.program_id)?,
            period_id: parse_uuid(&self.period_id)?,
            is_draft: self.is_draft != 0,
            is_submitted: self.is_submitted != 0,
            submitted_by: parse_optional_uuid(&self.submitted_by)?,
            submitted_at: parse_optional_datetime(&self.submitted_at)?,
            description: self.description,
            is_deleted: self.is_deleted != 0,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            created_by_user_id: parse_optional_uuid(&self.created_by_user_id)?,
            updated_by_user_id: parse_optional_uuid(&self.updated_by_user_id)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramTarget {
    pub target_id: Uuid,
    pub submission_id: Uuid,
    pub target_number: String,
    pub target_description: String,
    pub status_indicator: StatusIndicator,
    pub status_description: Option<String>,
    pub remarks: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TargetRow {
    pub target_id: String,
    pub submission_id: String,
    pub target_number: String,
    pub target_description: String,
    pub status_indicator: String,
    pub status_description: Option<String>,
    pub remarks: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_deleted: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TargetRow {
    pub fn into_entity(self) -> DomainResult<ProgramTarget> {
        Ok(ProgramTarget {
            target_id: parse_uuid(&self.target_id)?,
            submission_id: parse_uuid(&self.submission_id)?,
            target_number: self.target_number,
            target_description: self.target_description,
            status_indicator: StatusIndicator::from_str(&self.status_indicator).ok_or_else(|| {
                DomainError::Internal(format!("Invalid status indicator: {}", self.status_indicator))
            })?,
            status_description: self.status_description,
            remarks: self.remarks,
            start_date: parse_optional_date(&self.start_date)?,
            end_date: parse_optional_date(&self.end_date)?,
            is_deleted: self.is_deleted != 0,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

/// Submission returned to clients together with its live targets
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: ProgramSubmission,
    pub targets: Vec<ProgramTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmission {
    pub program_id: Uuid,
    pub period_id: Uuid,
    pub description: Option<String>,
}

impl Validate for NewSubmission {
    fn validate(&self) -> DomainResult<()> {
        if let Some(description) = &self.description {
            ValidationBuilder::new("description", Some(description.clone()))
                .max_length(5000)
                .validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSubmission {
    /// `Some(None)` clears the description
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
}

impl Validate for UpdateSubmission {
    fn validate(&self) -> DomainResult<()> {
        if let Some(Some(description)) = &self.description {
            ValidationBuilder::new("description", Some(description.clone()))
                .max_length(5000)
                .validate()?;
        }
        Ok(())
    }
}

/// Identifies the submission being finalized; all three must agree
#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeRequest {
    pub program_id: Uuid,
    pub period_id: Uuid,
}

fn parse_input_date(field: &str, value: &Option<String>) -> DomainResult<Option<NaiveDate>> {
    value
        .as_deref()
        .map(|v| parse_date(v).map_err(|_| ValidationError::format(field, "must be a date in YYYY-MM-DD format").into()))
        .transpose()
}

fn validate_status(value: &Option<String>) -> DomainResult<()> {
    if let Some(status) = value {
        ValidationBuilder::new("status_indicator", Some(status.clone()))
            .one_of(&StatusIndicator::ALLOWED, Some("must be not_started, in_progress, delayed or completed"))
            .validate()?;
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTarget {
    pub target_description: String,
    pub status_indicator: Option<String>,
    pub status_description: Option<String>,
    pub remarks: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl Validate for NewTarget {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("target_description", Some(self.target_description.clone()))
            .required()
            .max_length(5000)
            .validate()?;
        validate_status(&self.status_indicator)?;

        let start = parse_input_date("start_date", &self.start_date)?;
        let end = parse_input_date("end_date", &self.end_date)?;
        validate_optional_date_range(start, end, "end_date", "start_date")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTarget {
    pub target_description: Option<String>,
    pub status_indicator: Option<String>,
    pub status_description: Option<String>,
    pub remarks: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl Validate for UpdateTarget {
    fn validate(&self) -> DomainResult<()> {
        if let Some(description) = &self.target_description {
            ValidationBuilder::new("target_description", Some(description.clone()))
                .required()
                .max_length(5000)
                .validate()?;
        }
        validate_status(&self.status_indicator)?;
        parse_input_date("start_date", &self.start_date)?;
        parse_input_date("end_date", &self.end_date)?;
        Ok(())
    }
}

/// Target values to write, after merging an update onto the stored target
#[derive(Debug, Clone)]
pub struct TargetFields {
    pub target_description: String,
    pub status_indicator: StatusIndicator,
    pub status_description: Option<String>,
    pub remarks: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TargetFields {
    pub fn from_new(target: &NewTarget) -> DomainResult<Self> {
        target.validate()?;
        Ok(Self {
            target_description: target.target_description.trim().to_string(),
            status_indicator: target
                .status_indicator
                .as_deref()
                .and_then(StatusIndicator::from_str)
                .unwrap_or(StatusIndicator::NotStarted),
            status_description: target.status_description.clone(),
            remarks: target.remarks.clone(),
            start_date: parse_input_date("start_date", &target.start_date)?,
            end_date: parse_input_date("end_date", &target.end_date)?,
        })
    }

    pub fn merged(current: &ProgramTarget, update: &UpdateTarget) -> DomainResult<Self> {
        update.validate()?;
        let fields = Self {
            target_description: update
                .target_description
                .as_deref()
                .map(|d| d.trim().to_string())
                .unwrap_or_else(|| current.target_description.clone()),
            status_indicator: update
                .status_indicator
                .as_deref()
                .and_then(StatusIndicator::from_str)
                .unwrap_or(current.status_indicator),
            status_description: update.status_description.clone().or_else(|| current.status_description.clone()),
            remarks: update.remarks.clone().or_else(|| current.remarks.clone()),
            start_date: parse_input_date("start_date", &update.start_date)?.or(current.start_date),
            end_date: parse_input_date("end_date", &update.end_date)?.or(current.end_date),
        };
        validate_optional_date_range(fields.start_date, fields.end_date, "end_date", "start_date")?;
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ProgramTarget {
        ProgramTarget {
            target_id: Uuid::new_v4(),
            submission_id: Uuid::new_v4(),
            target_number: "1.1.1".to_string(),
            target_description: "Train 40 extension officers".to_string(),
            status_indicator: StatusIndicator::InProgress,
            status_description: None,
            remarks: Some("on track".to_string()),
            start_date: Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
            end_date: Some(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unknown_status_indicator_is_rejected() {
        let new = NewTarget {
            target_description: "Build 3 clinics".to_string(),
            status_indicator: Some("stalled".to_string()),
            status_description: None,
            remarks: None,
            start_date: None,
            end_date: None,
        };
        assert!(new.validate().is_err());
    }

    #[test]
    fn new_target_defaults_to_not_started() {
        let new = NewTarget {
            target_description: "  Build 3 clinics ".to_string(),
            status_indicator: None,
            status_description: None,
            remarks: None,
            start_date: Some("2025-01-01".to_string()),
            end_date: None,
        };
        let fields = TargetFields::from_new(&new).unwrap();
        assert_eq!(fields.status_indicator, StatusIndicator::NotStarted);
        assert_eq!(fields.target_description, "Build 3 clinics");
        assert_eq!(fields.start_date, NaiveDate::from_ymd_opt(2025, 1, 1));
    }

    #[test]
    fn merged_update_keeps_unset_fields_and_checks_dates() {
        let current = target();
        let update = UpdateTarget {
            status_indicator: Some("delayed".to_string()),
            ..Default::default()
        };
        let fields = TargetFields::merged(&current, &update).unwrap();
        assert_eq!(fields.status_indicator, StatusIndicator::Delayed);
        assert_eq!(fields.remarks.as_deref(), Some("on track"));

        let backwards = UpdateTarget {
            end_date: Some("2024-12-31".to_string()),
            ..Default::default()
        };
        assert!(TargetFields::merged(&current, &backwards).is_err());
    }

    #[test]
    fn state_description_cites_flags() {
        let now = Utc::now();
        let submission = ProgramSubmission {
            submission_id: Uuid::new_v4(),
            program_id: Uuid::new_v4(),
            period_id: Uuid::new_v4(),
            is_draft: true,
            is_submitted: false,
            submitted_by: None,
            submitted_at: None,
            description: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            created_by_user_id: None,
            updated_by_user_id: None,
        };
        assert_eq!(submission.state_description(), "a draft (is_draft=1, is_submitted=0)");
    }
}
