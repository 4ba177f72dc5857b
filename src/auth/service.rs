//! Auth Service
//! Mission: Sign-in, refresh rotation, sign-out and the checks behind every gate

use crate::auth::{
    error::AuthError,
    jwt::JwtHandler,
    models::{
        Session, SessionBundle, SessionTokens, SignUpRequest, TokenKind, TokenSubject, User,
        UserClaims, UserResponse, UserRole,
    },
    password::PasswordHasher,
    session_store::SessionStore,
    user_store::UserStore,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct AuthService {
    jwt: Arc<JwtHandler>,
    sessions: Arc<dyn SessionStore>,
    users: Arc<UserStore>,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        jwt: JwtHandler,
        sessions: Arc<dyn SessionStore>,
        users: Arc<UserStore>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            jwt: Arc::new(jwt),
            sessions,
            users,
            hasher,
        }
    }

    pub fn jwt(&self) -> &JwtHandler {
        &self.jwt
    }

    /// Register an account with the given role
    pub async fn sign_up(&self, req: &SignUpRequest, role: UserRole) -> Result<UserResponse, AuthError> {
        validate_sign_up(req)?;

        let hasher = self.hasher;
        let password = req.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;

        let user = self
            .users
            .insert_user(req.email.trim(), req.username.trim(), &password_hash, role)
            .await?;
        Ok(UserResponse::from_user(&user))
    }

    /// Create the first admin account when none exists yet
    pub async fn bootstrap_admin(&self, req: &SignUpRequest) -> Result<Option<UserResponse>, AuthError> {
        if self.users.count_admins().await? > 0 {
            return Ok(None);
        }
        let admin = self.sign_up(req, UserRole::Admin).await?;
        info!("Bootstrap admin {} created", admin.id);
        Ok(Some(admin))
    }

    /// Verify credentials, mint an access/refresh pair and open a session
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionBundle, AuthError> {
        let user = match self.users.find_by_email(email.trim()).await? {
            Some(user) => user,
            None => {
                warn!("Sign-in for unknown account rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let hasher = self.hasher;
        let (password, stored_hash) = (password.to_string(), user.password_hash.clone());
        if let Err(e) =
            tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash)).await?
        {
            warn!("Sign-in for user {} rejected", user.id);
            return Err(e);
        }

        let session_id = Uuid::new_v4().to_string();
        let access = self.jwt.issue(TokenKind::Access {
            claims: user.claims(),
            session_id: session_id.clone(),
        })?;
        let refresh = self.jwt.issue(TokenKind::Refresh {
            claims: user.claims(),
            session_id: session_id.clone(),
        })?;

        let session_id = self
            .sessions
            .create(Session {
                id: session_id,
                user_id: user.id.clone(),
                access_token: access.token.clone(),
                refresh_token: refresh.token.clone(),
                created_at: Utc::now().to_rfc3339(),
            })
            .await?;

        info!("User {} signed in (session {})", user.id, session_id);
        Ok(bundle(&user, session_id, access.token, refresh.token))
    }

    /// Exchange a refresh token for a new pair without extending the session
    pub async fn rotate(&self, refresh_token: &str) -> Result<SessionBundle, AuthError> {
        let payload = self.jwt.verify(refresh_token, TokenSubject::Refresh)?;
        let original_expiry = payload.exp.ok_or(AuthError::MalformedToken)?;

        // The store is the authority: a deleted row revokes a well-signed token
        let session = self.sessions.find_by_refresh_token(refresh_token).await?;
        if payload.sid.as_deref() != Some(session.id.as_str()) {
            return Err(AuthError::SessionNotFound);
        }

        // Claims come from the current profile so role changes take effect
        let user = self.users.get_profile(&session.user_id).await.map_err(|e| match e {
            AuthError::UserNotFound => AuthError::SessionNotFound,
            other => other,
        })?;
        let claims = user.claims();

        let access = self.jwt.issue(TokenKind::Access {
            claims: claims.clone(),
            session_id: session.id.clone(),
        })?;
        let refresh = self
            .jwt
            .reissue_with_fixed_expiry(claims, &session.id, original_expiry)?;

        if let Err(e) = self
            .sessions
            .update_tokens(&session.id, refresh_token, &access.token, &refresh.token)
            .await
        {
            warn!("Rotation of session {} lost: {}", session.id, e);
            return Err(e);
        }

        info!("Session {} rotated for user {}", session.id, user.id);
        Ok(bundle(&user, session.id, access.token, refresh.token))
    }

    pub async fn sign_out(&self, session_id: &str) -> Result<(), AuthError> {
        self.sessions.delete(session_id).await?;
        info!("Session {} signed out", session_id);
        Ok(())
    }

    pub fn issue_admin_token(&self) -> Result<String, AuthError> {
        Ok(self.jwt.issue(TokenKind::Admin)?.token)
    }

    pub fn issue_service_key(&self) -> Result<String, AuthError> {
        Ok(self.jwt.issue(TokenKind::Service)?.token)
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserResponse, AuthError> {
        Ok(UserResponse::from_user(&self.users.get_profile(user_id).await?))
    }

    pub async fn set_role(&self, user_id: &str, role_id: i32) -> Result<UserResponse, AuthError> {
        let role = UserRole::from_level(role_id)
            .ok_or_else(|| AuthError::InvalidRequest(format!("unknown role id {}", role_id)))?;
        Ok(UserResponse::from_user(&self.users.update_role(user_id, role).await?))
    }

    /// Bearer check: a valid access token whose session still holds it
    pub async fn authenticate_bearer(&self, token: &str) -> Result<UserClaims, AuthError> {
        let payload = self.jwt.verify(token, TokenSubject::Access)?;
        let (claims, session_id) = match (payload.claims, payload.sid) {
            (Some(claims), Some(sid)) => (claims, sid),
            _ => return Err(AuthError::MalformedToken),
        };

        let session = self.sessions.find_by_session_id(&session_id).await?;
        if session.user_id != claims.id || session.access_token != token {
            return Err(AuthError::Unauthorized);
        }
        Ok(claims)
    }

    pub fn authenticate_service_key(&self, key: &str) -> Result<(), AuthError> {
        self.jwt.verify(key, TokenSubject::Service).map(|_| ())
    }

    pub fn authenticate_admin_token(&self, token: &str) -> Result<(), AuthError> {
        self.jwt.verify(token, TokenSubject::Admin).map(|_| ())
    }
}

fn bundle(user: &User, session_id: String, access_token: String, refresh_token: String) -> SessionBundle {
    SessionBundle {
        user: UserResponse::from_user(user),
        token: SessionTokens {
            session_id,
            access_token,
            refresh_token,
        },
    }
}

fn validate_sign_up(req: &SignUpRequest) -> Result<(), AuthError> {
    if !is_email(req.email.trim()) {
        return Err(AuthError::InvalidRequest("email pattern is invalid".into()));
    }
    if req.username.trim().is_empty() {
        return Err(AuthError::InvalidRequest("username is required".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
            .unwrap_or(false)
}
