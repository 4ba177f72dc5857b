//! SQLite Handle
//! Mission: Run blocking SQLite work off the async workers, under a deadline

use crate::auth::error::AuthError;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Shared connection plus the per-operation deadline
#[derive(Clone)]
pub struct SqliteHandle {
    conn: Arc<Mutex<Connection>>,
    op_timeout: Duration,
}

impl SqliteHandle {
    /// Open `db_path` and apply `schema` once
    pub fn open(db_path: &str, schema: &str, op_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path))?;
        conn.execute_batch(schema)
            .context("Failed to initialize schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            op_timeout,
        })
    }

    /// Run a closure on the blocking pool under the deadline.
    /// Closures issue a single statement, so a timeout never leaves a row
    /// half-written: the statement either lands whole or not at all.
    pub async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, AuthError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, AuthError> + Send + 'static,
    {
        let conn = self.conn.clone();
        let task = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        });

        match tokio::time::timeout(self.op_timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => {
                warn!(
                    op,
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "Store deadline exceeded"
                );
                Err(AuthError::Storage(format!("{} timed out", op)))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}
