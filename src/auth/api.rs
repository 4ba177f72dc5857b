//! Authentication API Endpoints
//! Mission: Sign-up, sign-in, refresh, sign-out and privileged token minting

use crate::auth::{
    error::AuthError,
    models::{
        RefreshRequest, RoleUpdateRequest, SessionBundle, SignInRequest, SignOutRequest,
        SignUpRequest, UserClaims, UserResponse, UserRole,
    },
    service::AuthService,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminTokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    pub key: String,
}

/// POST /v1/users/signup (service key)
pub async fn sign_up_customer(
    State(auth): State<AuthService>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    let user = auth.sign_up(&payload, UserRole::Customer).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /v1/users/signup-admin (bearer + admin role + admin token)
pub async fn sign_up_admin(
    State(auth): State<AuthService>,
    Extension(claims): Extension<UserClaims>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    let user = auth.sign_up(&payload, UserRole::Admin).await?;
    info!("Admin {} registered by {}", user.id, claims.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /v1/users/signin (service key)
pub async fn sign_in(
    State(auth): State<AuthService>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<SessionBundle>, AuthError> {
    Ok(Json(auth.sign_in(&payload.email, &payload.password).await?))
}

/// POST /v1/users/refresh (service key)
pub async fn refresh_session(
    State(auth): State<AuthService>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<SessionBundle>, AuthError> {
    Ok(Json(auth.rotate(&payload.refresh_token).await?))
}

/// POST /v1/users/signout (service key)
pub async fn sign_out(
    State(auth): State<AuthService>,
    Json(payload): Json<SignOutRequest>,
) -> Result<StatusCode, AuthError> {
    auth.sign_out(&payload.session_id).await?;
    Ok(StatusCode::OK)
}

/// GET /v1/users/admin/secret (bearer + admin role)
pub async fn generate_admin_token(
    State(auth): State<AuthService>,
) -> Result<Json<AdminTokenResponse>, AuthError> {
    Ok(Json(AdminTokenResponse {
        token: auth.issue_admin_token()?,
    }))
}

/// GET /v1/appinfo/apikey (bearer + admin role)
pub async fn generate_api_key(
    State(auth): State<AuthService>,
) -> Result<Json<ApiKeyResponse>, AuthError> {
    Ok(Json(ApiKeyResponse {
        key: auth.issue_service_key()?,
    }))
}

/// GET /v1/users/:user_id (bearer + identity match)
pub async fn get_user_profile(
    State(auth): State<AuthService>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AuthError> {
    Ok(Json(auth.profile(&user_id).await?))
}

/// PATCH /v1/users/:user_id/role (bearer + admin role)
pub async fn update_user_role(
    State(auth): State<AuthService>,
    Extension(claims): Extension<UserClaims>,
    Path(user_id): Path<String>,
    Json(payload): Json<RoleUpdateRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    // Don't allow changing your own role
    if user_id == claims.id {
        return Err(AuthError::InvalidRequest("cannot change your own role".into()));
    }

    let user = auth.set_role(&user_id, payload.role_id).await?;
    info!("User {} role set to {} by {}", user.id, user.role_id, claims.id);
    Ok(Json(user))
}
