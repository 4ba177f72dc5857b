//! Authentication Models
//! Mission: Define identity, token and session data structures

use serde::{Deserialize, Serialize};

/// Issuer stamped into every token this service signs
pub const TOKEN_ISSUER: &str = "passport-api";

/// Audience granted to user-facing tokens
pub const USER_AUDIENCE: [&str; 2] = ["customer", "admin"];

/// Audience granted to admin tokens
pub const ADMIN_AUDIENCE: [&str; 1] = ["admin"];

/// User roles, ordered by privilege level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum UserRole {
    #[serde(rename = "customer")]
    Customer, // Own resources only
    #[serde(rename = "admin")]
    Admin, // Catalogue management, token minting
}

impl UserRole {
    pub fn level(&self) -> i32 {
        match self {
            UserRole::Customer => 1,
            UserRole::Admin => 2,
        }
    }

    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            1 => Some(UserRole::Customer),
            2 => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Admin => "admin",
        }
    }
}

/// Identity embedded in access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserClaims {
    pub id: String,
    pub role_id: i32,
}

impl UserClaims {
    pub fn new(id: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: id.into(),
            role_id: role.level(),
        }
    }
}

/// What a token is minted for. User tokens carry the claims and the owning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Access { claims: UserClaims, session_id: String },
    Refresh { claims: UserClaims, session_id: String },
    Admin,
    Service,
}

impl TokenKind {
    pub fn subject(&self) -> TokenSubject {
        match self {
            TokenKind::Access { .. } => TokenSubject::Access,
            TokenKind::Refresh { .. } => TokenSubject::Refresh,
            TokenKind::Admin => TokenSubject::Admin,
            TokenKind::Service => TokenSubject::Service,
        }
    }
}

/// The `sub` value of a token; selects the verification key and validation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSubject {
    Access,
    Refresh,
    Admin,
    Service,
}

impl TokenSubject {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSubject::Access => "access-token",
            TokenSubject::Refresh => "refresh-token",
            TokenSubject::Admin => "admin-token",
            TokenSubject::Service => "api-key",
        }
    }

    pub fn audience(&self) -> &'static [&'static str] {
        match self {
            TokenSubject::Admin => &ADMIN_AUDIENCE,
            _ => &USER_AUDIENCE,
        }
    }

    /// Service keys are the only tokens without an expiry
    pub fn expires(&self) -> bool {
        !matches!(self, TokenSubject::Service)
    }
}

/// Signed JWT payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPayload {
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub nbf: i64,
    pub iat: i64,
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<UserClaims>,
}

/// A token string together with the payload it was signed from
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub payload: TokenPayload,
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: UserRole,
    pub created_at: String,
}

impl User {
    pub fn claims(&self) -> UserClaims {
        UserClaims::new(self.id.clone(), self.role)
    }
}

/// Server-side binding of a user to the currently valid token pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: String,
}

/// Sign-in request body
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Sign-up request body
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Refresh request body
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Sign-out request body
#[derive(Debug, Deserialize)]
pub struct SignOutRequest {
    pub session_id: String,
}

/// Role change request body
#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub role_id: i32,
}

/// User response (sanitized)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role_id: i32,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            role_id: user.role.level(),
        }
    }
}

/// Token pair handed to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of sign-in and rotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBundle {
    pub user: UserResponse,
    pub token: SessionTokens,
}
