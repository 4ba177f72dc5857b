//! Passport Backend Library
//!
//! Signed identity tokens, refresh-token rotation and role-gated HTTP access.
//! The `passport` binary and the integration tests both build on these modules.

pub mod api;
pub mod auth;
pub mod middleware;
pub mod models;

pub use api::create_router;
pub use models::ServerConfig;
