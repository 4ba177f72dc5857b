//! Authentication Module
//! Mission: Signed identity tokens, refresh rotation and role-gated access

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod session_store;
pub mod user_store;

pub use config::JwtConfig;
pub use error::AuthError;
pub use jwt::JwtHandler;
pub use password::PasswordHasher;
pub use service::AuthService;
pub use session_store::{SessionStore, SqliteSessionStore};
pub use user_store::UserStore;
