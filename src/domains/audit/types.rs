use crate::errors::{DomainError, DomainResult};
use crate::types::{parse_datetime, parse_optional_uuid, parse_uuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What happened to the subject of an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    LoginFailed,
    Logout,
    Create,
    Update,
    Delete,
    Finalize,
    Unsubmit,
    StatusChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Finalize => "finalize",
            AuditAction::Unsubmit => "unsubmit",
            AuditAction::StatusChange => "status_change",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "login" => Some(AuditAction::Login),
            "login_failed" => Some(AuditAction::LoginFailed),
            "logout" => Some(AuditAction::Logout),
            "create" => Some(AuditAction::Create),
            "update" => Some(AuditAction::Update),
            "delete" => Some(AuditAction::Delete),
            "finalize" => Some(AuditAction::Finalize),
            "unsubmit" => Some(AuditAction::Unsubmit),
            "status_change" => Some(AuditAction::StatusChange),
            _ => None,
        }
    }
}

/// Kind of record an audit entry is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    User,
    Agency,
    Period,
    Initiative,
    Program,
    Submission,
    Target,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::User => "user",
            SubjectType::Agency => "agency",
            SubjectType::Period => "period",
            SubjectType::Initiative => "initiative",
            SubjectType::Program => "program",
            SubjectType::Submission => "submission",
            SubjectType::Target => "target",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(SubjectType::User),
            "agency" => Some(SubjectType::Agency),
            "period" => Some(SubjectType::Period),
            "initiative" => Some(SubjectType::Initiative),
            "program" => Some(SubjectType::Program),
            "submission" => Some(SubjectType::Submission),
            "target" => Some(SubjectType::Target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(AuditOutcome::Success),
            "failure" => Some(AuditOutcome::Failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Removed => "removed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "added" => Some(ChangeType::Added),
            "modified" => Some(ChangeType::Modified),
            "removed" => Some(ChangeType::Removed),
            _ => None,
        }
    }
}

/// Before/after value of one field touched by an audited operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field_name: String,
    pub field_type: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_type: ChangeType,
}

impl FieldChange {
    /// Compare two values of a field; `None` when nothing changed.
    pub fn diff(
        field_name: &str,
        field_type: &str,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Option<Self> {
        let change_type = match (&old_value, &new_value) {
            (None, None) => return None,
            (Some(old), Some(new)) if old == new => return None,
            (None, Some(_)) => ChangeType::Added,
            (Some(_), None) => ChangeType::Removed,
            (Some(_), Some(_)) => ChangeType::Modified,
        };

        Some(Self {
            field_name: field_name.to_string(),
            field_type: field_type.to_string(),
            old_value,
            new_value,
            change_type,
        })
    }

    /// Snapshot of a value on a freshly created record
    pub fn added(field_name: &str, field_type: &str, new_value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.to_string(),
            field_type: field_type.to_string(),
            old_value: None,
            new_value: Some(new_value.into()),
            change_type: ChangeType::Added,
        }
    }
}

/// Audit entry waiting to be written
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub subject_type: SubjectType,
    pub subject_id: Option<Uuid>,
    pub details: String,
    pub outcome: AuditOutcome,
    pub changes: Vec<FieldChange>,
}

impl NewAuditEntry {
    pub fn new(
        user_id: Option<Uuid>,
        action: AuditAction,
        subject_type: SubjectType,
        subject_id: Option<Uuid>,
    ) -> Self {
        Self {
            user_id,
            action,
            subject_type,
            subject_id,
            details: String::new(),
            outcome: AuditOutcome::Success,
            changes: Vec::new(),
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn failure(mut self) -> Self {
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn with_changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.changes = changes;
        self
    }
}

/// Audit log entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub subject_type: SubjectType,
    pub subject_id: Option<Uuid>,
    pub details: String,
    pub outcome: AuditOutcome,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditLogRow {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub subject_type: String,
    pub subject_id: Option<String>,
    pub details: String,
    pub outcome: String,
    pub created_at: String,
}

impl AuditLogRow {
    pub fn into_entity(self) -> DomainResult<AuditLog> {
        Ok(AuditLog {
            id: parse_uuid(&self.id)?,
            user_id: parse_optional_uuid(&self.user_id)?,
            action: AuditAction::from_str(&self.action)
                .ok_or_else(|| DomainError::Internal(format!("Unknown audit action: {}", self.action)))?,
            subject_type: SubjectType::from_str(&self.subject_type)
                .ok_or_else(|| DomainError::Internal(format!("Unknown audit subject: {}", self.subject_type)))?,
            subject_id: parse_optional_uuid(&self.subject_id)?,
            details: self.details,
            outcome: AuditOutcome::from_str(&self.outcome)
                .ok_or_else(|| DomainError::Internal(format!("Unknown audit outcome: {}", self.outcome)))?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

/// A persisted field change belonging to one audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFieldChange {
    pub id: Uuid,
    pub audit_log_id: Uuid,
    pub field_name: String,
    pub field_type: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditFieldChangeRow {
    pub id: String,
    pub audit_log_id: String,
    pub field_name: String,
    pub field_type: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_type: String,
}

impl AuditFieldChangeRow {
    pub fn into_entity(self) -> DomainResult<AuditFieldChange> {
        Ok(AuditFieldChange {
            id: parse_uuid(&self.id)?,
            audit_log_id: parse_uuid(&self.audit_log_id)?,
            field_name: self.field_name,
            field_type: self.field_type,
            old_value: self.old_value,
            new_value: self.new_value,
            change_type: ChangeType::from_str(&self.change_type)
                .ok_or_else(|| DomainError::Internal(format!("Unknown change type: {}", self.change_type)))?,
        })
    }
}

/// Filters accepted by the audit log listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditLogFilter {
    pub user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub subject_type: Option<SubjectType>,
    pub subject_id: Option<Uuid>,
    pub outcome: Option<AuditOutcome>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_classifies_changes() {
        assert_eq!(FieldChange::diff("remarks", "text", None, None), None);
        assert_eq!(
            FieldChange::diff("remarks", "text", Some("a".into()), Some("a".into())),
            None
        );
        assert_eq!(
            FieldChange::diff("remarks", "text", None, Some("a".into())).map(|c| c.change_type),
            Some(ChangeType::Added)
        );
        assert_eq!(
            FieldChange::diff("remarks", "text", Some("a".into()), None).map(|c| c.change_type),
            Some(ChangeType::Removed)
        );
        assert_eq!(
            FieldChange::diff("remarks", "text", Some("a".into()), Some("b".into())).map(|c| c.change_type),
            Some(ChangeType::Modified)
        );
    }

    #[test]
    fn enum_strings_round_trip() {
        for action in [AuditAction::Finalize, AuditAction::Unsubmit, AuditAction::StatusChange] {
            assert_eq!(AuditAction::from_str(action.as_str()), Some(action));
        }
        assert_eq!(SubjectType::from_str("submission"), Some(SubjectType::Submission));
        assert_eq!(AuditOutcome::from_str("nope"), None);
    }
}
