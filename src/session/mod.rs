//! Session-scoped answer storage.
//!
//! Every answer a user gives is stored under `(session id, key)`. The session
//! id lives in the `ivory_session` cookie, issued by [`ensure_session_cookie`]
//! on the first response. Handlers take a [`Session`] argument, which pairs
//! that id with the configured [`SessionStore`] backend.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use axum::{
  extract::{FromRequestParts, Request, State},
  http::{request::Parts, StatusCode},
  middleware::Next,
  response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "ivory_session";

/// Length of generated session ids
const SESSION_ID_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("session store unavailable")]
  Unavailable,
  #[error("session storage failed: {0}")]
  Storage(#[from] rusqlite::Error),
  #[error("stored value could not be (de)serialized: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// Key/value backend for session answers.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
  /// Read one answer. Expired sessions read as empty.
  async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, SessionError>;

  /// Write one answer and refresh the session's expiry.
  async fn set(&self, session_id: &str, key: &str, value: &str) -> Result<(), SessionError>;

  /// Write several answers atomically: either all are stored or none are.
  async fn set_many(&self, session_id: &str, entries: &[(&str, String)]) -> Result<(), SessionError>;

  async fn delete(&self, session_id: &str, key: &str) -> Result<(), SessionError>;
}

/// Session id extracted from the request cookie
#[derive(Debug, Clone)]
pub struct SessionKey(pub String);

/// Request-scoped handle onto the current user's answers.
#[derive(Clone)]
pub struct Session {
  id: String,
  store: Arc<dyn SessionStore>,
}

impl Session {
  pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
    Self {
      id: id.into(),
      store,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
    self.store.get(&self.id, key).await
  }

  /// Read a JSON-encoded answer
  pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
    match self.get(key).await? {
      Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
      None => Ok(None),
    }
  }

  pub async fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
    self.store.set(&self.id, key, value).await
  }

  /// Store an answer as JSON
  pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
    let raw = serde_json::to_string(value)?;
    self.set(key, &raw).await
  }

  pub async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), SessionError> {
    self.store.set_many(&self.id, entries).await
  }

  pub async fn delete(&self, key: &str) -> Result<(), SessionError> {
    self.store.delete(&self.id, key).await
  }
}

impl FromRequestParts<AppState> for Session {
  type Rejection = Response;

  async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
    let key = parts.extensions.get::<SessionKey>().cloned().ok_or_else(|| {
      tracing::error!("Session extractor used on a route without the session cookie layer");
      (StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable").into_response()
    })?;
    Ok(Session::new(key.0, state.sessions.clone()))
  }
}

/// Middleware: make sure every request carries a session id, issuing a
/// cookie when the browser doesn't have a usable one yet. The cookie is
/// re-sent on every response so its expiry slides with the store's TTL.
pub async fn ensure_session_cookie(
  State(state): State<AppState>,
  jar: CookieJar,
  mut request: Request,
  next: Next,
) -> Response {
  let session_id = match jar
    .get(SESSION_COOKIE_NAME)
    .map(|c| c.value().to_string())
    .filter(|id| is_valid_session_id(id))
  {
    Some(existing) => existing,
    None => {
      tracing::debug!("Issuing new session cookie");
      generate_session_id()
    }
  };

  request.extensions_mut().insert(SessionKey(session_id.clone()));
  let response = next.run(request).await;

  let cookie = Cookie::build((SESSION_COOKIE_NAME, session_id))
    .path("/")
    .http_only(true)
    .same_site(SameSite::Lax)
    .secure(state.config.server.cookie_secure)
    .max_age(time::Duration::hours(state.config.session.ttl_hours))
    .build();

  (jar.add(cookie), response).into_response()
}

/// Generate a new session ID
pub fn generate_session_id() -> String {
  use rand::Rng;
  let mut rng = rand::rng();
  (0..SESSION_ID_LEN)
    .map(|_| {
      let idx = rng.random_range(0..36);
      if idx < 10 {
        (b'0' + idx) as char
      } else {
        (b'a' + idx - 10) as char
      }
    })
    .collect()
}

/// Only ids shaped like ours are accepted from the cookie
pub fn is_valid_session_id(id: &str) -> bool {
  id.len() == SESSION_ID_LEN
    && id
      .chars()
      .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
}
