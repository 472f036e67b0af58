use uuid::Uuid;
use crate::types::{UserRole, Permission};
use crate::errors::ServiceError;

/// Represents the authentication context for the current request
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The ID of the authenticated user
    pub user_id: Uuid,

    /// The role of the authenticated user
    pub role: UserRole,

    /// The agency the user reports for (None for administrators)
    pub agency_id: Option<Uuid>,
}

impl AuthContext {
    /// Create a new authentication context
    pub fn new(user_id: Uuid, role: UserRole, agency_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            role,
            agency_id,
        }
    }

    /// Create a new authentication context for internal system operations
    pub fn internal_system_context() -> Self {
        Self {
            user_id: Uuid::nil(),
            role: UserRole::Admin,
            agency_id: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    /// Check if user has a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    /// Authorize a specific permission, returning an error if not allowed
    pub fn authorize(&self, permission: Permission) -> Result<(), ServiceError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "User does not have permission: {}",
                permission.as_str()
            )))
        }
    }

    /// The agency of an agency-side user; errors for accounts without one
    pub fn require_agency(&self) -> Result<Uuid, ServiceError> {
        self.agency_id.ok_or_else(|| {
            ServiceError::PermissionDenied("This action requires an agency account".to_string())
        })
    }

    /// Read access to an agency's records: admins see everything, others only their own agency
    pub fn authorize_agency_access(&self, agency_id: &Uuid) -> Result<(), ServiceError> {
        if self.is_admin() || self.agency_id.as_ref() == Some(agency_id) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                "You do not have access to records of another agency".to_string()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agency_access_is_scoped() {
        let agency = Uuid::new_v4();
        let other = Uuid::new_v4();
        let ctx = AuthContext::new(Uuid::new_v4(), UserRole::Agency, Some(agency));

        assert!(ctx.authorize_agency_access(&agency).is_ok());
        assert!(ctx.authorize_agency_access(&other).is_err());
        assert_eq!(ctx.require_agency().unwrap(), agency);

        let admin = AuthContext::internal_system_context();
        assert!(admin.authorize_agency_access(&other).is_ok());
        assert!(admin.require_agency().is_err());
    }

    #[test]
    fn authorize_reports_missing_permission() {
        let ctx = AuthContext::new(Uuid::new_v4(), UserRole::Agency, Some(Uuid::new_v4()));
        let err = ctx.authorize(Permission::ManagePeriods).unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(ref msg) if msg.contains("manage_periods")));
    }
}
