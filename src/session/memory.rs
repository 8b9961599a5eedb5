//! In-memory session storage.
//!
//! Answers are kept per session ID in a map guarded by a mutex. Sessions
//! expire after a configurable period of inactivity; expired entries are
//! purged opportunistically on write.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{SessionError, SessionStore};
use crate::config;

/// Session entry with last access time for expiration
struct SessionEntry {
  values: HashMap<String, String>,
  last_access: DateTime<Utc>,
}

impl SessionEntry {
  fn new() -> Self {
    Self {
      values: HashMap::new(),
      last_access: Utc::now(),
    }
  }
}

pub struct MemoryStore {
  sessions: Mutex<HashMap<String, SessionEntry>>,
  ttl: Duration,
}

impl MemoryStore {
  pub fn new(ttl_hours: i64) -> Self {
    Self {
      sessions: Mutex::new(HashMap::new()),
      ttl: Duration::hours(ttl_hours),
    }
  }

  fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SessionEntry>>, SessionError> {
    self.sessions.lock().map_err(|_| {
      tracing::error!("Session store mutex poisoned");
      SessionError::Unavailable
    })
  }

  fn is_live(&self, entry: &SessionEntry) -> bool {
    entry.last_access > Utc::now() - self.ttl
  }

  /// Entry for writing; an expired session starts over empty
  fn entry_mut<'a>(
    &self,
    sessions: &'a mut HashMap<String, SessionEntry>,
    session_id: &str,
  ) -> &'a mut SessionEntry {
    // Clean up expired sessions occasionally (~10% chance)
    if rand::random::<u8>() < config::SESSION_CLEANUP_THRESHOLD {
      cleanup_expired(sessions, self.ttl);
    }

    let entry = sessions
      .entry(session_id.to_string())
      .or_insert_with(SessionEntry::new);
    if !self.is_live(entry) {
      entry.values.clear();
    }
    entry.last_access = Utc::now();
    entry
  }
}

#[async_trait]
impl SessionStore for MemoryStore {
  async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, SessionError> {
    let mut sessions = self.lock()?;
    match sessions.get_mut(session_id) {
      Some(entry) if self.is_live(entry) => {
        entry.last_access = Utc::now();
        Ok(entry.values.get(key).cloned())
      }
      _ => Ok(None),
    }
  }

  async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<(), SessionError> {
    let mut sessions = self.lock()?;
    let entry = self.entry_mut(&mut sessions, session_id);
    entry.values.insert(key.to_string(), value.to_string());
    Ok(())
  }

  async fn set_many(&self, session_id: &str, entries: &[(&str, String)]) -> Result<(), SessionError> {
    // One lock acquisition covers the whole batch
    let mut sessions = self.lock()?;
    let entry = self.entry_mut(&mut sessions, session_id);
    for (key, value) in entries {
      entry.values.insert(key.to_string(), value.clone());
    }
    Ok(())
  }

  async fn delete(&self, session_id: &str, key: &str) -> Result<(), SessionError> {
    let mut sessions = self.lock()?;
    if let Some(entry) = sessions.get_mut(session_id) {
      entry.values.remove(key);
    }
    Ok(())
  }
}

/// Clean up expired sessions
fn cleanup_expired(sessions: &mut HashMap<String, SessionEntry>, ttl: Duration) {
  let expiry = Utc::now() - ttl;
  sessions.retain(|_, entry| entry.last_access > expiry);
}
