//! Session Storage
//! Mission: Persist the user ↔ token-pair binding that backs revocation
//!
//! The session row, not the token signature, decides whether a refresh or
//! access token is still usable. Every operation is bounded by a deadline.

use crate::auth::{db::SqliteHandle, error::AuthError, models::Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use std::time::Duration;
use tracing::debug;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> Result<String, AuthError>;

    async fn find_by_refresh_token(&self, refresh_token: &str) -> Result<Session, AuthError>;

    async fn find_by_session_id(&self, session_id: &str) -> Result<Session, AuthError>;

    /// Replace both tokens in one step, but only while the row still holds
    /// `expected_refresh`. A lost race surfaces as `SessionNotFound`.
    async fn update_tokens(
        &self,
        session_id: &str,
        expected_refresh: &str,
        new_access: &str,
        new_refresh: &str,
    ) -> Result<(), AuthError>;

    async fn delete(&self, session_id: &str) -> Result<(), AuthError>;
}

/// SQLite-backed session store
pub struct SqliteSessionStore {
    db: SqliteHandle,
}

impl SqliteSessionStore {
    pub fn new(db_path: &str, op_timeout: Duration) -> Result<Self> {
        let db = SqliteHandle::open(db_path, SCHEMA_SQL, op_timeout)
            .context("Failed to initialize session store")?;
        Ok(Self { db })
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        access_token: row.get(2)?,
        refresh_token: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: Session) -> Result<String, AuthError> {
        self.db.run("create", move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, access_token, refresh_token, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session.id,
                    session.user_id,
                    session.access_token,
                    session.refresh_token,
                    session.created_at,
                ],
            )?;
            debug!("Session {} created for user {}", session.id, session.user_id);
            Ok(session.id)
        })
        .await
    }

    async fn find_by_refresh_token(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let refresh_token = refresh_token.to_string();
        self.db.run("find_by_refresh_token", move |conn| {
            conn.query_row(
                "SELECT id, user_id, access_token, refresh_token, created_at
                 FROM sessions WHERE refresh_token = ?1",
                params![refresh_token],
                session_from_row,
            )
            .optional()?
            .ok_or(AuthError::SessionNotFound)
        })
        .await
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Session, AuthError> {
        let session_id = session_id.to_string();
        self.db.run("find_by_session_id", move |conn| {
            conn.query_row(
                "SELECT id, user_id, access_token, refresh_token, created_at
                 FROM sessions WHERE id = ?1",
                params![session_id],
                session_from_row,
            )
            .optional()?
            .ok_or(AuthError::SessionNotFound)
        })
        .await
    }

    async fn update_tokens(
        &self,
        session_id: &str,
        expected_refresh: &str,
        new_access: &str,
        new_refresh: &str,
    ) -> Result<(), AuthError> {
        let (session_id, expected_refresh) = (session_id.to_string(), expected_refresh.to_string());
        let (new_access, new_refresh) = (new_access.to_string(), new_refresh.to_string());

        self.db.run("update_tokens", move |conn| {
            let rows = conn.execute(
                "UPDATE sessions SET access_token = ?1, refresh_token = ?2
                 WHERE id = ?3 AND refresh_token = ?4",
                params![new_access, new_refresh, session_id, expected_refresh],
            )?;
            if rows == 0 {
                return Err(AuthError::SessionNotFound);
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, session_id: &str) -> Result<(), AuthError> {
        let session_id = session_id.to_string();
        self.db.run("delete", move |conn| {
            let rows = conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            if rows == 0 {
                return Err(AuthError::SessionNotFound);
            }
            debug!("Session {} deleted", session_id);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (SqliteSessionStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = SqliteSessionStore::new(db_path, Duration::from_secs(2)).unwrap();
        (store, temp_file)
    }

    fn session(id: &str, refresh: &str) -> Session {
        Session {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            access_token: format!("access-{}", id),
            refresh_token: refresh.to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (store, _temp) = create_test_store();

        let id = store.create(session("s1", "r1")).await.unwrap();
        assert_eq!(id, "s1");

        let by_refresh = store.find_by_refresh_token("r1").await.unwrap();
        assert_eq!(by_refresh.id, "s1");
        assert_eq!(by_refresh.user_id, "user-1");

        let by_id = store.find_by_session_id("s1").await.unwrap();
        assert_eq!(by_id, by_refresh);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let (store, _temp) = create_test_store();

        assert_eq!(
            store.find_by_refresh_token("nope").await,
            Err(AuthError::SessionNotFound)
        );
        assert_eq!(
            store.find_by_session_id("nope").await,
            Err(AuthError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn test_update_tokens_is_conditional() {
        let (store, _temp) = create_test_store();
        store.create(session("s1", "r1")).await.unwrap();

        store.update_tokens("s1", "r1", "a2", "r2").await.unwrap();
        let updated = store.find_by_session_id("s1").await.unwrap();
        assert_eq!(updated.access_token, "a2");
        assert_eq!(updated.refresh_token, "r2");

        // Stale expected value loses
        assert_eq!(
            store.update_tokens("s1", "r1", "a3", "r3").await,
            Err(AuthError::SessionNotFound)
        );
        assert_eq!(store.find_by_session_id("s1").await.unwrap().refresh_token, "r2");
        assert_eq!(
            store.find_by_refresh_token("r1").await,
            Err(AuthError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _temp) = create_test_store();
        store.create(session("s1", "r1")).await.unwrap();

        store.delete("s1").await.unwrap();
        assert_eq!(
            store.find_by_refresh_token("r1").await,
            Err(AuthError::SessionNotFound)
        );
        assert_eq!(store.delete("s1").await, Err(AuthError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_duplicate_refresh_token_rejected() {
        let (store, _temp) = create_test_store();
        store.create(session("s1", "r1")).await.unwrap();

        let err = store.create(session("s2", "r1")).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let temp_file = NamedTempFile::new().unwrap();
        let store =
            SqliteSessionStore::new(temp_file.path().to_str().unwrap(), Duration::from_millis(50))
                .unwrap();
        store.create(session("s1", "r1")).await.unwrap();

        let guard = store.db.lock();
        let result = store.find_by_session_id("s1").await;
        drop(guard);

        assert!(matches!(result, Err(AuthError::Storage(_))));
    }
}
