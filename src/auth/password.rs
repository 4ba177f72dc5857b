//! Credential Verifier
//! Mission: Salted bcrypt hashing with a configurable cost

use crate::auth::error::AuthError;
use bcrypt::{hash, verify};
use tracing::warn;

/// Cost factors bcrypt accepts
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// bcrypt hasher; the cost factor is fixed at construction
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        hash(password, self.cost).map_err(|e| AuthError::Storage(format!("hashing failed: {}", e)))
    }

    /// Fails with `InvalidCredentials` on mismatch or an unreadable stored hash
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<(), AuthError> {
        match verify(password, stored_hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => {
                warn!("Stored password hash could not be checked: {}", e);
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}
