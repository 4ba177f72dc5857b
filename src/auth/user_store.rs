//! User Storage
//! Mission: Store user accounts and their current role with SQLite

use crate::auth::{
    db::SqliteHandle,
    error::AuthError,
    models::{User, UserRole},
};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, types::Type, ErrorCode, OptionalExtension, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT UNIQUE NOT NULL,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    role_id INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
"#;

const SELECT_USER: &str =
    "SELECT id, email, username, password_hash, role_id, created_at FROM users";

/// User storage with SQLite backend
pub struct UserStore {
    db: SqliteHandle,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str, op_timeout: Duration) -> Result<Self> {
        let db = SqliteHandle::open(db_path, SCHEMA_SQL, op_timeout)
            .context("Failed to initialize user store")?;
        Ok(Self { db })
    }

    /// Insert a user whose password is already hashed
    pub async fn insert_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now().to_rfc3339(),
        };

        let user = self
            .db
            .run("insert_user", move |conn| {
                conn.execute(
                    "INSERT INTO users (id, email, username, password_hash, role_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        user.id,
                        user.email,
                        user.username,
                        user.password_hash,
                        user.role.level(),
                        user.created_at,
                    ],
                )
                .map_err(|e| match e.sqlite_error_code() {
                    Some(ErrorCode::ConstraintViolation) => AuthError::UserAlreadyExists,
                    _ => AuthError::from(e),
                })?;
                Ok(user)
            })
            .await?;

        info!("Created user {} ({})", user.id, user.role.as_str());
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let email = email.to_string();
        self.db
            .run("find_by_email", move |conn| {
                Ok(conn
                    .query_row(
                        &format!("{} WHERE email = ?1", SELECT_USER),
                        params![email],
                        user_from_row,
                    )
                    .optional()?)
            })
            .await
    }

    /// Current profile; role changes are visible immediately
    pub async fn get_profile(&self, user_id: &str) -> Result<User, AuthError> {
        let user_id = user_id.to_string();
        self.db
            .run("get_profile", move |conn| {
                conn.query_row(
                    &format!("{} WHERE id = ?1", SELECT_USER),
                    params![user_id],
                    user_from_row,
                )
                .optional()?
                .ok_or(AuthError::UserNotFound)
            })
            .await
    }

    pub async fn update_role(&self, user_id: &str, role: UserRole) -> Result<User, AuthError> {
        let id = user_id.to_string();
        self.db
            .run("update_role", move |conn| {
                let rows = conn.execute(
                    "UPDATE users SET role_id = ?1 WHERE id = ?2",
                    params![role.level(), id],
                )?;
                if rows == 0 {
                    return Err(AuthError::UserNotFound);
                }
                Ok(())
            })
            .await?;

        info!("Role of user {} set to {}", user_id, role.as_str());
        self.get_profile(user_id).await
    }

    pub async fn count_admins(&self) -> Result<i64, AuthError> {
        self.db
            .run("count_admins", |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE role_id = ?1",
                    params![UserRole::Admin.level()],
                    |row| row.get(0),
                )?)
            })
            .await
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role_id: i32 = row.get(4)?;
    let role = UserRole::from_level(role_id).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Integer,
            format!("unknown role id {}", role_id).into(),
        )
    })?;

    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        role,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path, Duration::from_secs(2)).unwrap();
        (store, temp_file)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (store, _temp) = create_test_store();

        let user = store
            .insert_user("alice@shop.io", "alice", "hash", UserRole::Customer)
            .await
            .unwrap();
        let found = store.find_by_email("alice@shop.io").await.unwrap().unwrap();

        assert_eq!(found.id, user.id);
        assert_eq!(found.username, "alice");
        assert_eq!(found.role, UserRole::Customer);
        assert!(store.find_by_email("bob@shop.io").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_or_username() {
        let (store, _temp) = create_test_store();
        store
            .insert_user("alice@shop.io", "alice", "hash", UserRole::Customer)
            .await
            .unwrap();

        let dup_email = store
            .insert_user("alice@shop.io", "alice2", "hash", UserRole::Customer)
            .await;
        assert!(matches!(dup_email, Err(AuthError::UserAlreadyExists)));

        let dup_name = store
            .insert_user("other@shop.io", "alice", "hash", UserRole::Customer)
            .await;
        assert!(matches!(dup_name, Err(AuthError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_update_role() {
        let (store, _temp) = create_test_store();
        let user = store
            .insert_user("alice@shop.io", "alice", "hash", UserRole::Customer)
            .await
            .unwrap();
        assert_eq!(store.count_admins().await.unwrap(), 0);

        let promoted = store.update_role(&user.id, UserRole::Admin).await.unwrap();
        assert_eq!(promoted.role, UserRole::Admin);
        assert_eq!(store.get_profile(&user.id).await.unwrap().role, UserRole::Admin);
        assert_eq!(store.count_admins().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (store, _temp) = create_test_store();
        assert!(matches!(
            store.get_profile("missing").await,
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            store.update_role("missing", UserRole::Admin).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_role_id_is_storage_error() {
        let (store, _temp) = create_test_store();
        let user = store
            .insert_user("alice@shop.io", "alice", "hash", UserRole::Customer)
            .await
            .unwrap();
        store
            .db
            .lock()
            .execute("UPDATE users SET role_id = 9 WHERE id = ?1", params![user.id])
            .unwrap();

        assert!(matches!(
            store.get_profile(&user.id).await,
            Err(AuthError::Storage(_))
        ));
        assert!(matches!(
            store.find_by_email("alice@shop.io").await,
            Err(AuthError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_respects_deadline() {
        let temp_file = NamedTempFile::new().unwrap();
        let store =
            UserStore::new(temp_file.path().to_str().unwrap(), Duration::from_millis(50)).unwrap();

        let guard = store.db.lock();
        let result = store.find_by_email("alice@shop.io").await;
        drop(guard);

        assert!(matches!(result, Err(AuthError::Storage(_))));
    }
}
