//! SQLite-backed session storage.
//!
//! Answers survive restarts and are shared by every worker of one process.
//! Expiry is tracked per session and slides forward on every write.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{SessionError, SessionStore};
use crate::config;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    expires_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS session_answers (
    session_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (session_id, key)
);

CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    ttl: Duration,
}

impl SqliteStore {
    /// Open (creating if needed) the session database at `path`
    pub fn open(path: &Path, ttl_hours: i64) -> Result<Self, SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!("Session store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            ttl: Duration::hours(ttl_hours),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SessionError> {
        self.conn.lock().map_err(|_| {
            tracing::error!("Session database mutex poisoned");
            SessionError::Unavailable
        })
    }

    fn expires_at(&self) -> i64 {
        (Utc::now() + self.ttl).timestamp()
    }

    /// Refresh expiry, wiping the answers of a session that already expired
    fn touch(&self, tx: &Transaction<'_>, session_id: &str) -> Result<(), SessionError> {
        let now = Utc::now().timestamp();
        tx.execute(
            "DELETE FROM session_answers WHERE session_id = ?1
             AND EXISTS (SELECT 1 FROM sessions WHERE session_id = ?1 AND expires_at <= ?2)",
            params![session_id, now],
        )?;
        tx.execute(
            "INSERT INTO sessions (session_id, expires_at) VALUES (?1, ?2)
             ON CONFLICT(session_id) DO UPDATE SET expires_at = excluded.expires_at",
            params![session_id, self.expires_at()],
        )?;
        Ok(())
    }

    fn maybe_cleanup(tx: &Transaction<'_>) -> Result<(), SessionError> {
        // Clean up expired sessions occasionally (~10% chance)
        if rand::random::<u8>() < config::SESSION_CLEANUP_THRESHOLD {
            cleanup_expired(tx)?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, SessionError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT a.value FROM session_answers a
                 JOIN sessions s ON s.session_id = a.session_id
                 WHERE a.session_id = ?1 AND a.key = ?2 AND s.expires_at > ?3",
                params![session_id, key, Utc::now().timestamp()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<(), SessionError> {
        self.set_many(session_id, &[(key, value.to_string())]).await
    }

    async fn set_many(&self, session_id: &str, entries: &[(&str, String)]) -> Result<(), SessionError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::maybe_cleanup(&tx)?;
        self.touch(&tx, session_id)?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO session_answers (session_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id, key) DO UPDATE SET value = excluded.value",
                params![session_id, key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn delete(&self, session_id: &str, key: &str) -> Result<(), SessionError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM session_answers WHERE session_id = ?1 AND key = ?2",
            params![session_id, key],
        )?;
        Ok(())
    }
}

/// Drop every expired session and its answers
fn cleanup_expired(conn: &Connection) -> Result<usize, SessionError> {
    let now = Utc::now().timestamp();
    conn.execute(
        "DELETE FROM session_answers WHERE session_id IN
         (SELECT session_id FROM sessions WHERE expires_at <= ?1)",
        params![now],
    )?;
    let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
    if removed > 0 {
        tracing::debug!("Removed {} expired sessions", removed);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp.path().join("nested/sessions.db"), 1).unwrap();
        (temp, store)
    }

    fn expire(store: &SqliteStore, session_id: &str) {
        let conn = store.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE session_id = ?2",
            params![Utc::now().timestamp() - 10, session_id],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (_temp, store) = open_store();
        assert_eq!(store.get("s1", "k").await.unwrap(), None);

        store.set("s1", "k", "v1").await.unwrap();
        assert_eq!(store.get("s1", "k").await.unwrap(), Some("v1".to_string()));

        store.set("s1", "k", "v2").await.unwrap();
        assert_eq!(store.get("s1", "k").await.unwrap(), Some("v2".to_string()));

        store.delete("s1", "k").await.unwrap();
        assert_eq!(store.get("s1", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let (_temp, store) = open_store();
        store.set("s1", "k", "one").await.unwrap();
        store.set("s2", "k", "two").await.unwrap();
        assert_eq!(store.get("s1", "k").await.unwrap(), Some("one".to_string()));
        assert_eq!(store.get("s2", "k").await.unwrap(), Some("two".to_string()));
    }

    #[tokio::test]
    async fn test_set_many_is_atomic_batch() {
        let (_temp, store) = open_store();
        store
            .set_many("s1", &[("a", "1".to_string()), ("b", "2".to_string())])
            .await
            .unwrap();
        assert_eq!(store.get("s1", "a").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.get("s1", "b").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_expired_session_reads_empty_and_restarts() {
        let (_temp, store) = open_store();
        store.set("s1", "old", "x").await.unwrap();
        expire(&store, "s1");

        assert_eq!(store.get("s1", "old").await.unwrap(), None);

        store.set("s1", "new", "y").await.unwrap();
        assert_eq!(store.get("s1", "old").await.unwrap(), None);
        assert_eq!(store.get("s1", "new").await.unwrap(), Some("y".to_string()));
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let (_temp, store) = open_store();
        store.set("stale", "k", "v").await.unwrap();
        store.set("fresh", "k", "v").await.unwrap();
        expire(&store, "stale");

        let removed = {
            let conn = store.conn.lock().unwrap();
            cleanup_expired(&conn).unwrap()
        };
        assert_eq!(removed, 1);
        assert_eq!(store.get("fresh", "k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sessions.db");
        {
            let store = SqliteStore::open(&path, 1).unwrap();
            store.set("s1", "k", "kept").await.unwrap();
        }
        let store = SqliteStore::open(&path, 1).unwrap();
        assert_eq!(store.get("s1", "k").await.unwrap(), Some("kept".to_string()));
    }
}
