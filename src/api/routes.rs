use axum::{
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::{
    auth::{
        api as auth_api,
        middleware::{admin_token_auth, api_key_auth, identity_match, jwt_auth, require_role},
        models::UserRole,
        AuthService,
    },
    middleware::request_logging,
};

/// Create the API router
pub fn create_router(auth: AuthService) -> Router {
    // Service-key routes: callers without a user session
    let service_routes = Router::new()
        .route("/v1/users/signup", post(auth_api::sign_up_customer))
        .route("/v1/users/signin", post(auth_api::sign_in))
        .route("/v1/users/refresh", post(auth_api::refresh_session))
        .route("/v1/users/signout", post(auth_api::sign_out))
        .route_layer(middleware::from_fn_with_state(auth.clone(), api_key_auth));

    // Admin-only routes; the last route_layer runs first
    let admin_routes = Router::new()
        .route("/v1/users/signup-admin", post(auth_api::sign_up_admin))
        .route_layer(middleware::from_fn_with_state(auth.clone(), admin_token_auth))
        .route("/v1/users/admin/secret", get(auth_api::generate_admin_token))
        .route("/v1/users/:user_id/role", patch(auth_api::update_user_role))
        .route("/v1/appinfo/apikey", get(auth_api::generate_api_key))
        .route_layer(middleware::from_fn_with_state(UserRole::Admin, require_role))
        .route_layer(middleware::from_fn_with_state(auth.clone(), jwt_auth));

    // Own-resource routes
    let profile_routes = Router::new()
        .route("/v1/users/:user_id", get(auth_api::get_user_profile))
        .route_layer(middleware::from_fn(identity_match))
        .route_layer(middleware::from_fn_with_state(auth.clone(), jwt_auth));

    Router::new()
        .route("/", get(health_check))
        .merge(service_routes)
        .merge(admin_routes)
        .merge(profile_routes)
        .fallback(router_not_found)
        .with_state(auth)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn router_not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "router not found".to_string(),
        }),
    )
}

// ===== Response Types =====

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
