//! Authentication Middleware
//! Mission: Gate protected routes on bearer tokens, roles, service keys and identity
//!
//! Each gate re-runs on every request; nothing about a caller is cached.

use crate::auth::{
    error::AuthError,
    models::{UserClaims, UserRole},
    service::AuthService,
};
use axum::{
    extract::{Path, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use tracing::warn;

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

/// Requires `Authorization: Bearer <access token>` backed by a live session
pub async fn jwt_auth(
    State(auth): State<AuthService>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())
        .map(str::to_string)
        .ok_or(AuthError::Unauthorized)?;

    let claims = auth.authenticate_bearer(&token).await.map_err(|e| {
        warn!(kind = %e, path = %req.uri().path(), "Bearer token rejected");
        e
    })?;

    // Handlers read the caller via Extension<UserClaims>
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Requires the authenticated caller to hold at least `min_role`. Layer inside `jwt_auth`.
pub async fn require_role(
    State(min_role): State<UserRole>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = extract_claims(&req).ok_or(AuthError::Unauthorized)?;

    if claims.role_id < min_role.level() {
        warn!(
            user = %claims.id,
            role_id = claims.role_id,
            required = min_role.level(),
            "Insufficient role"
        );
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(req).await)
}

/// Requires a valid service key in `X-Api-Key`; no user identity involved
pub async fn api_key_auth(
    State(auth): State<AuthService>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let key = header_value(req.headers(), API_KEY_HEADER).ok_or(AuthError::Unauthorized)?;

    auth.authenticate_service_key(key).map_err(|e| {
        warn!(kind = %e, "Service key rejected");
        AuthError::Unauthorized
    })?;
    Ok(next.run(req).await)
}

/// Requires a valid admin token in `X-Admin-Token`
pub async fn admin_token_auth(
    State(auth): State<AuthService>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = header_value(req.headers(), ADMIN_TOKEN_HEADER).ok_or(AuthError::Unauthorized)?;

    auth.authenticate_admin_token(token).map_err(|e| {
        warn!(kind = %e, "Admin token rejected");
        AuthError::Unauthorized
    })?;
    Ok(next.run(req).await)
}

/// The `{user_id}` path segment must be the caller, unless the caller is an admin.
/// Layer inside `jwt_auth`.
pub async fn identity_match(
    Path(params): Path<HashMap<String, String>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = extract_claims(&req).ok_or(AuthError::Unauthorized)?;
    let target = params.get("user_id").ok_or(AuthError::Forbidden)?;

    if !caller_may_act_on(claims, target) {
        warn!(user = %claims.id, target = %target, "Identity mismatch");
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(req).await)
}

/// Extract claims from request (use after jwt_auth)
pub fn extract_claims(req: &Request) -> Option<&UserClaims> {
    req.extensions().get::<UserClaims>()
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header_value(headers, "Authorization")?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn caller_may_act_on(claims: &UserClaims, target_user_id: &str) -> bool {
    claims.id == target_user_id || claims.role_id >= UserRole::Admin.level()
}
