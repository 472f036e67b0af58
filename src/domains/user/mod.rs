pub mod types;
pub mod repository;
pub mod service;

pub use types::{Credentials, NewUser, User, UserResponse};
pub use repository::{SqliteUserRepository, UserRepository};
pub use service::{UserService, UserServiceImpl};
