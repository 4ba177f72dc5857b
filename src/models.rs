//! Server configuration
//!
//! Everything except the signing secrets comes from flags or the
//! environment; the secrets are read by `auth::JwtConfig::from_env`.

use crate::auth::password::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "passport")]
#[command(about = "Authentication and session service")]
pub struct ServerConfig {
    /// Extra .env file loaded on top of the default search
    #[arg(long, env = "PASSPORT_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Bind host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// SQLite database holding users and sessions
    #[arg(long, env = "AUTH_DB_PATH", default_value = "passport_auth.db")]
    pub db_path: String,

    /// bcrypt cost factor
    #[arg(
        long,
        env = "BCRYPT_COST",
        default_value_t = bcrypt::DEFAULT_COST,
        value_parser = clap::value_parser!(u32).range(MIN_BCRYPT_COST as i64..=MAX_BCRYPT_COST as i64)
    )]
    pub bcrypt_cost: u32,

    /// Deadline for a single user or session store operation
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value = "2000")]
    pub store_timeout_ms: u64,

    /// Creates the first admin when no admin exists (with the two below)
    #[arg(long, env = "BOOTSTRAP_ADMIN_EMAIL")]
    pub bootstrap_admin_email: Option<String>,

    #[arg(long, env = "BOOTSTRAP_ADMIN_USERNAME", default_value = "admin")]
    pub bootstrap_admin_username: String,

    #[arg(long, env = "BOOTSTRAP_ADMIN_PASSWORD", hide_env_values = true)]
    pub bootstrap_admin_password: Option<String>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
