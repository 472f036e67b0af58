pub mod types;
pub mod repository;
pub mod service;

pub use types::{AuditAction, AuditLog, AuditOutcome, FieldChange, NewAuditEntry, SubjectType};
pub use repository::{AuditRepository, SqliteAuditRepository};
pub use service::{AuditService, AuditServiceImpl};
