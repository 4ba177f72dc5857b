//! Passport - authentication and session service
//! Issues signed identity tokens, rotates refresh tokens, gates routes by role.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use passport_backend::{
    auth::{
        models::SignUpRequest, AuthService, JwtConfig, JwtHandler, PasswordHasher,
        SqliteSessionStore, UserStore,
    },
    create_router, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let mut config = ServerConfig::parse();
    if let Some(env_file) = config.env_file.clone() {
        dotenv::from_path(&env_file)
            .with_context(|| format!("Failed to load env file {}", env_file.display()))?;
        config = ServerConfig::parse();
    }

    init_tracing();

    info!("🔐 Passport starting");

    let jwt_config = JwtConfig::from_env().context("Invalid token configuration")?;
    info!(
        "Token lifetimes: access={}s refresh={}s",
        jwt_config.access_ttl_secs(),
        jwt_config.refresh_ttl_secs()
    );

    let users = Arc::new(
        UserStore::new(&config.db_path, config.store_timeout())
            .context("Failed to initialize user store")?,
    );
    let sessions = Arc::new(
        SqliteSessionStore::new(&config.db_path, config.store_timeout())
            .context("Failed to initialize session store")?,
    );
    info!("💾 Auth database ready at {}", config.db_path);

    let auth = AuthService::new(
        JwtHandler::new(jwt_config),
        sessions,
        users,
        PasswordHasher::new(config.bcrypt_cost),
    );

    bootstrap_admin(&auth, &config).await?;

    let app = create_router(auth);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

/// Create the first admin from BOOTSTRAP_ADMIN_* when configured
async fn bootstrap_admin(auth: &AuthService, config: &ServerConfig) -> Result<()> {
    let (email, password) = match (
        config.bootstrap_admin_email.as_ref(),
        config.bootstrap_admin_password.as_ref(),
    ) {
        (Some(email), Some(password)) => (email.clone(), password.clone()),
        (None, None) => return Ok(()),
        _ => {
            warn!("Bootstrap admin needs both email and password; skipping");
            return Ok(());
        }
    };

    let req = SignUpRequest {
        email,
        username: config.bootstrap_admin_username.clone(),
        password,
    };
    match auth
        .bootstrap_admin(&req)
        .await
        .context("Failed to create bootstrap admin")?
    {
        Some(admin) => info!("👤 Bootstrap admin ready: {}", admin.email),
        None => info!("Admin account already present; bootstrap skipped"),
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passport_backend=debug,passport=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also the crate root, for runs from elsewhere via --manifest-path
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
