pub mod types;
pub mod repository;
pub mod service;

pub use types::{Agency, NewAgency};
pub use repository::{AgencyRepository, SqliteAgencyRepository};
pub use service::{AgencyService, AgencyServiceImpl};
