pub mod types;
pub mod conflict;
pub mod repository;
pub mod service;

pub use types::{PeriodInput, PeriodResponse, PeriodStatus, PeriodType, ReportingPeriod};
pub use repository::{PeriodRepository, SqlitePeriodRepository};
pub use service::{PeriodService, PeriodServiceImpl};
