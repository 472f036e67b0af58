// Public modules
pub mod api;
pub mod auth;
pub mod config;
pub mod domains;
pub mod errors;
pub mod state;
pub mod types;
pub mod validation;

// Private modules
mod db_migration;

pub use config::AppConfig;
pub use db_migration::initialize_database;
pub use state::AppState;
