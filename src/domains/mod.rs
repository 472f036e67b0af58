pub mod agency;
pub mod audit;
pub mod core;
pub mod period;
pub mod permission;
pub mod program;
pub mod submission;
pub mod user;

pub use user::{User, UserService};
