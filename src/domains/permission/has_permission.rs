use serde::{Deserialize, Serialize};

// --- User Role Definition ---

/// UserRole enum for authorization in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Portal administrator: manages periods, initiatives, users and reviews submissions
    Admin,
    /// Agency staff member drafting reports on the agency's programs
    Agency,
    /// Agency focal point: finalizes and unsubmits the agency's reports
    Focal,
}

// --- Permission Enum Definition ---

/// Permission enum representing individual permissions in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    // Account management
    ManageUsers,
    ManageAgencies,

    // Reporting periods
    ViewPeriods,
    ManagePeriods,

    // Initiatives and programs
    ManageInitiatives,
    ViewPrograms,
    CreatePrograms,
    EditPrograms,

    // Submissions
    ViewSubmissions,
    CreateSubmissions,
    EditSubmissions,
    FinalizeSubmissions,
    UnsubmitSubmissions,
    ReviewSubmissions,

    // System
    ViewAuditLogs,
}

// --- UserRole Implementation ---

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Agency => "agency",
            UserRole::Focal => "focal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "agency" => Some(UserRole::Agency),
            "focal" => Some(UserRole::Focal),
            _ => None,
        }
    }

    /// Agency-side roles are tied to exactly one agency.
    pub fn requires_agency(&self) -> bool {
        matches!(self, UserRole::Agency | UserRole::Focal)
    }

    /// Check if the user has a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        match self {
            UserRole::Admin => match permission {
                // Admins review submissions; authoring them is agency work
                Permission::CreateSubmissions
                | Permission::EditSubmissions
                | Permission::FinalizeSubmissions
                | Permission::UnsubmitSubmissions => false,
                _ => true,
            },
            UserRole::Focal => match permission {
                Permission::ManageUsers
                | Permission::ManageAgencies
                | Permission::ManagePeriods
                | Permission::ManageInitiatives
                | Permission::ReviewSubmissions
                | Permission::ViewAuditLogs => false,
                _ => true,
            },
            UserRole::Agency => match permission {
                Permission::ViewPeriods
                | Permission::ViewPrograms
                | Permission::CreatePrograms
                | Permission::EditPrograms
                | Permission::ViewSubmissions
                | Permission::CreateSubmissions
                | Permission::EditSubmissions => true,

                Permission::FinalizeSubmissions
                | Permission::UnsubmitSubmissions
                | Permission::ManageUsers
                | Permission::ManageAgencies
                | Permission::ManagePeriods
                | Permission::ManageInitiatives
                | Permission::ReviewSubmissions
                | Permission::ViewAuditLogs => false,
            },
        }
    }
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ManageAgencies => "manage_agencies",
            Permission::ViewPeriods => "view_periods",
            Permission::ManagePeriods => "manage_periods",
            Permission::ManageInitiatives => "manage_initiatives",
            Permission::ViewPrograms => "view_programs",
            Permission::CreatePrograms => "create_programs",
            Permission::EditPrograms => "edit_programs",
            Permission::ViewSubmissions => "view_submissions",
            Permission::CreateSubmissions => "create_submissions",
            Permission::EditSubmissions => "edit_submissions",
            Permission::FinalizeSubmissions => "finalize_submissions",
            Permission::UnsubmitSubmissions => "unsubmit_submissions",
            Permission::ReviewSubmissions => "review_submissions",
            Permission::ViewAuditLogs => "view_audit_logs",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_string_round_trip() {
        for role in [UserRole::Admin, UserRole::Agency, UserRole::Focal] {
            assert_eq!(UserRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::from_str("field"), None);
    }

    #[test]
    fn only_focal_may_finalize_or_unsubmit() {
        for permission in [Permission::FinalizeSubmissions, Permission::UnsubmitSubmissions] {
            assert!(UserRole::Focal.has_permission(permission));
            assert!(!UserRole::Agency.has_permission(permission));
            assert!(!UserRole::Admin.has_permission(permission));
        }
        assert!(UserRole::Agency.has_permission(Permission::EditSubmissions));
    }

    #[test]
    fn admin_reviews_but_does_not_author() {
        assert!(UserRole::Admin.has_permission(Permission::ManagePeriods));
        assert!(UserRole::Admin.has_permission(Permission::ReviewSubmissions));
        assert!(UserRole::Admin.has_permission(Permission::ViewAuditLogs));
        assert!(!UserRole::Admin.has_permission(Permission::FinalizeSubmissions));
        assert!(!UserRole::Admin.has_permission(Permission::CreateSubmissions));
    }

    #[test]
    fn agency_roles_cannot_manage_periods() {
        assert!(!UserRole::Agency.has_permission(Permission::ManagePeriods));
        assert!(!UserRole::Focal.has_permission(Permission::ManagePeriods));
        assert!(UserRole::Agency.has_permission(Permission::ViewPeriods));
        assert!(UserRole::Focal.requires_agency());
        assert!(!UserRole::Admin.requires_agency());
    }
}
