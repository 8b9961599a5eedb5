//! GOV.UK Pay client.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{check_status, ServiceError};

const SERVICE: &str = "payment provider";

const REFERENCE_LEN: usize = 8;
const REFERENCE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPayment {
  /// Pence
  pub amount: u32,
  pub reference: String,
  pub description: String,
  pub return_url: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPayment {
  pub payment_id: String,
  /// Hosted payment page to send the user to
  pub next_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentState {
  pub status: String,
  #[serde(default)]
  pub finished: bool,
  #[serde(default)]
  pub code: Option<String>,
  #[serde(default)]
  pub message: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn create_payment(&self, payment: &NewPayment) -> Result<CreatedPayment, ServiceError>;

  async fn lookup_payment(&self, payment_id: &str) -> Result<PaymentState, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
  payment_id: String,
  #[serde(default)]
  state: Option<PaymentState>,
  #[serde(rename = "_links", default)]
  links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Links {
  next_url: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
  href: String,
}

pub struct GovPayClient {
  http: reqwest::Client,
  api_url: String,
  api_key: String,
}

impl GovPayClient {
  pub fn new(http: reqwest::Client, api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self {
      http,
      api_url: api_url.into().trim_end_matches('/').to_string(),
      api_key: api_key.into(),
    }
  }

  fn ensure_configured(&self) -> Result<(), ServiceError> {
    if self.api_key.is_empty() {
      return Err(ServiceError::NotConfigured("payment API key"));
    }
    Ok(())
  }
}

#[async_trait]
impl PaymentGateway for GovPayClient {
  async fn create_payment(&self, payment: &NewPayment) -> Result<CreatedPayment, ServiceError> {
    self.ensure_configured()?;
    let response = self
      .http
      .post(format!("{}/v1/payments", self.api_url))
      .bearer_auth(&self.api_key)
      .json(payment)
      .send()
      .await?;
    let created: PaymentResponse = check_status(SERVICE, response).await?.json().await?;
    let next_url = created
      .links
      .and_then(|l| l.next_url)
      .map(|l| l.href)
      .ok_or_else(|| ServiceError::Protocol {
        service: SERVICE,
        detail: format!("payment {} has no next_url", created.payment_id),
      })?;
    tracing::info!("Created payment {} ({})", created.payment_id, payment.reference);
    Ok(CreatedPayment {
      payment_id: created.payment_id,
      next_url,
    })
  }

  async fn lookup_payment(&self, payment_id: &str) -> Result<PaymentState, ServiceError> {
    self.ensure_configured()?;
    let response = self
      .http
      .get(format!("{}/v1/payments/{}", self.api_url, payment_id))
      .bearer_auth(&self.api_key)
      .send()
      .await?;
    let found: PaymentResponse = check_status(SERVICE, response).await?.json().await?;
    found.state.ok_or_else(|| ServiceError::Protocol {
      service: SERVICE,
      detail: format!("payment {} has no state", found.payment_id),
    })
  }
}

/// Random payment reference: 8 characters from A-Z and 0-9
pub fn generate_reference() -> String {
  let mut rng = rand::rng();
  (0..REFERENCE_LEN)
    .map(|_| REFERENCE_CHARS[rng.random_range(0..REFERENCE_CHARS.len())] as char)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reference_shape() {
    for _ in 0..50 {
      let reference = generate_reference();
      assert_eq!(reference.len(), 8);
      assert!(reference.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
  }

  #[test]
  fn test_parses_created_payment() {
    let json = r#"{
      "payment_id": "abc123",
      "state": {"status": "created", "finished": false},
      "_links": {"next_url": {"href": "https://pay.example/secure/1", "method": "GET"}}
    }"#;
    let parsed: PaymentResponse = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.payment_id, "abc123");
    assert_eq!(parsed.links.unwrap().next_url.unwrap().href, "https://pay.example/secure/1");
  }

  #[test]
  fn test_parses_failed_state() {
    let json = r#"{
      "payment_id": "abc123",
      "state": {"status": "failed", "finished": true, "code": "P0030", "message": "Payment was cancelled by the user"}
    }"#;
    let parsed: PaymentResponse = serde_json::from_str(json).unwrap();
    let state = parsed.state.unwrap();
    assert_eq!(state.status, "failed");
    assert_eq!(state.code.as_deref(), Some("P0030"));
  }

  #[test]
  fn test_new_payment_omits_missing_email() {
    let payment = NewPayment {
      amount: 2000,
      reference: "ABCD1234".into(),
      description: "Ivory registration".into(),
      return_url: "http://localhost:3000/service-complete".into(),
      email: None,
    };
    let json = serde_json::to_value(&payment).unwrap();
    assert_eq!(json["amount"], 2000);
    assert!(json.get("email").is_none());
  }

  #[tokio::test]
  async fn test_unconfigured_client_refuses() {
    let client = GovPayClient::new(reqwest::Client::new(), "https://pay.example", "");
    let result = client.lookup_payment("x").await;
    assert!(matches!(result, Err(ServiceError::NotConfigured(_))));
  }
}
