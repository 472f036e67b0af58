pub mod types;
pub mod repository;
pub mod service;

pub use types::{
    FinalizeRequest, NewSubmission, NewTarget, ProgramSubmission, ProgramTarget, StatusIndicator,
    SubmissionDetail, UpdateSubmission, UpdateTarget,
};
pub use repository::{SqliteSubmissionRepository, SqliteTargetRepository, SubmissionRepository, TargetRepository};
pub use service::{SubmissionService, SubmissionServiceImpl};
