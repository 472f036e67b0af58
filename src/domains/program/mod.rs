pub mod types;
pub mod numbering;
pub mod repository;
pub mod service;

pub use types::{Initiative, NewInitiative, NewProgram, Program, ProgramFilter, UpdateProgram};
pub use repository::{InitiativeRepository, ProgramRepository, SqliteInitiativeRepository, SqliteProgramRepository};
pub use service::{ProgramService, ProgramServiceImpl};
