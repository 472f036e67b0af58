pub mod context;
pub mod service;
mod repository;
pub mod jwt;

// Re-export public items
pub use context::AuthContext;
pub use jwt::JwtManager;
pub use service::{AuthService, LoginResult, RefreshResult};

// Export internal items for use within auth module
pub(crate) use repository::AuthRepository;
