//! JWT configuration: signing secrets and TTL policy.
//!
//! Environment:
//!   JWT_SECRET_KEY      - signs access, refresh and service tokens (required)
//!   JWT_ADMIN_KEY       - signs admin tokens, must differ from JWT_SECRET_KEY (required)
//!   JWT_ACCESS_EXPIRES  - access token lifetime in seconds (default: 86400)
//!   JWT_REFRESH_EXPIRES - refresh token lifetime in seconds (default: 604800)

use crate::auth::error::AuthError;
use std::env;
use std::fmt;

/// Admin tokens always live exactly this long
pub const ADMIN_TOKEN_TTL_SECS: i64 = 300;

pub const DEFAULT_ACCESS_TTL_SECS: i64 = 86_400;
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 604_800;

/// Longest lifetime either user token may be configured with (10 years)
pub const MAX_TTL_SECS: i64 = 315_360_000;

/// Immutable signing configuration, built once at startup
#[derive(Clone)]
pub struct JwtConfig {
    secret_key: Vec<u8>,
    admin_key: Vec<u8>,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtConfig {
    pub fn new(
        secret_key: impl Into<Vec<u8>>,
        admin_key: impl Into<Vec<u8>>,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Result<Self, AuthError> {
        let secret_key = secret_key.into();
        let admin_key = admin_key.into();

        if secret_key.is_empty() {
            return Err(AuthError::Configuration("JWT_SECRET_KEY is empty".into()));
        }
        if admin_key.is_empty() {
            return Err(AuthError::Configuration("JWT_ADMIN_KEY is empty".into()));
        }
        if secret_key == admin_key {
            return Err(AuthError::Configuration(
                "JWT_ADMIN_KEY must differ from JWT_SECRET_KEY".into(),
            ));
        }
        if access_ttl_secs <= 0 || refresh_ttl_secs <= 0 {
            return Err(AuthError::Configuration("token TTLs must be positive".into()));
        }
        if access_ttl_secs > MAX_TTL_SECS || refresh_ttl_secs > MAX_TTL_SECS {
            return Err(AuthError::Configuration(format!(
                "token TTLs must not exceed {} seconds",
                MAX_TTL_SECS
            )));
        }
        if access_ttl_secs >= refresh_ttl_secs {
            return Err(AuthError::Configuration(
                "access TTL must be shorter than refresh TTL".into(),
            ));
        }

        Ok(Self {
            secret_key,
            admin_key,
            access_ttl_secs,
            refresh_ttl_secs,
        })
    }

    pub fn from_env() -> Result<Self, AuthError> {
        let secret_key = required_var("JWT_SECRET_KEY")?;
        let admin_key = required_var("JWT_ADMIN_KEY")?;
        let access_ttl = ttl_var("JWT_ACCESS_EXPIRES", DEFAULT_ACCESS_TTL_SECS)?;
        let refresh_ttl = ttl_var("JWT_REFRESH_EXPIRES", DEFAULT_REFRESH_TTL_SECS)?;

        Self::new(secret_key, admin_key, access_ttl, refresh_ttl)
    }

    pub fn secret_key(&self) -> &[u8] {
        &self.secret_key
    }

    pub fn admin_key(&self) -> &[u8] {
        &self.admin_key
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }
}

// Secrets stay out of logs and panic messages
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret_key", &"<redacted>")
            .field("admin_key", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

fn required_var(name: &str) -> Result<String, AuthError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AuthError::Configuration(format!("{} is not set", name)))
}

fn ttl_var(name: &str, default: i64) -> Result<i64, AuthError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| AuthError::Configuration(format!("{} must be a number of seconds", name))),
        Err(_) => Ok(default),
    }
}
