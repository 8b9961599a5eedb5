//! GOV.UK Notify email client.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{check_status, ServiceError};

const SERVICE: &str = "GOV.UK Notify";

const UUID_LEN: usize = 36;

/// An email to send through a Notify template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
  pub template_id: String,
  pub email_address: String,
  pub personalisation: BTreeMap<String, String>,
  pub reference: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send_email(&self, email: &Email) -> Result<(), ServiceError>;
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
  iss: &'a str,
  iat: i64,
}

/// Split a Notify API key (`{name}-{service id}-{secret}`) into service id and secret
pub fn parse_api_key(key: &str) -> Result<(String, String), ServiceError> {
  let key = key.trim();
  let min_len = 2 * UUID_LEN + 2;
  if !key.is_ascii() || key.len() < min_len {
    return Err(ServiceError::Protocol {
      service: SERVICE,
      detail: "API key is malformed".into(),
    });
  }
  let secret = &key[key.len() - UUID_LEN..];
  let service_id = &key[key.len() - 2 * UUID_LEN - 1..key.len() - UUID_LEN - 1];
  let separators_ok = key.as_bytes()[key.len() - UUID_LEN - 1] == b'-'
    && key.as_bytes()[key.len() - 2 * UUID_LEN - 2] == b'-';
  if !separators_ok {
    return Err(ServiceError::Protocol {
      service: SERVICE,
      detail: "API key is malformed".into(),
    });
  }
  Ok((service_id.to_string(), secret.to_string()))
}

pub struct NotifyClient {
  http: reqwest::Client,
  api_url: String,
  service_id: String,
  secret: String,
}

impl NotifyClient {
  pub fn new(http: reqwest::Client, api_url: impl Into<String>, api_key: &str) -> Result<Self, ServiceError> {
    let (service_id, secret) = parse_api_key(api_key)?;
    Ok(Self {
      http,
      api_url: api_url.into().trim_end_matches('/').to_string(),
      service_id,
      secret,
    })
  }

  /// Short-lived bearer token
  fn token(&self) -> Result<String, ServiceError> {
    let claims = Claims {
      iss: &self.service_id,
      iat: Utc::now().timestamp(),
    };
    Ok(encode(
      &Header::new(Algorithm::HS256),
      &claims,
      &EncodingKey::from_secret(self.secret.as_bytes()),
    )?)
  }
}

#[async_trait]
impl Notifier for NotifyClient {
  async fn send_email(&self, email: &Email) -> Result<(), ServiceError> {
    let response = self
      .http
      .post(format!("{}/v2/notifications/email", self.api_url))
      .bearer_auth(self.token()?)
      .json(email)
      .send()
      .await?;
    check_status(SERVICE, response).await?;
    tracing::info!("Sent email with template {} ({})", email.template_id, email.reference);
    Ok(())
  }
}

/// Used when no Notify key is configured
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
  async fn send_email(&self, email: &Email) -> Result<(), ServiceError> {
    tracing::warn!("Email notifications disabled, not sending {}", email.reference);
    Err(ServiceError::NotConfigured("GOV.UK Notify"))
  }
}

#[cfg(test)]
pub(crate) const TEST_API_KEY: &str =
  "test_key-26785a09-ab16-4eb0-8407-a37497a57506-3d844edf-8d35-48ac-975b-e847b4f122b0";
