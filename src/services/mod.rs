//! Clients for the services the application depends on.
//!
//! Each upstream is reached through a trait so handlers can be driven by
//! in-process fakes in tests. The real clients share one `reqwest::Client`.

pub mod address;
pub mod antimalware;
pub mod notify;
pub mod payment;

pub use address::{Address, AddressLookup, AddressLookupClient};
pub use antimalware::{ClamdScanner, DisabledScanner, MalwareScanner};
pub use notify::{DisabledNotifier, Email, Notifier, NotifyClient};
pub use payment::{CreatedPayment, GovPayClient, NewPayment, PaymentGateway, PaymentState};

use std::time::Duration;
use thiserror::Error;

use crate::config::UPSTREAM_TIMEOUT_SECS;

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("{service} responded {status}: {body}")]
  Upstream {
    service: &'static str,
    status: u16,
    body: String,
  },
  #[error("could not sign token: {0}")]
  Token(#[from] jsonwebtoken::errors::Error),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("unexpected reply from {service}: {detail}")]
  Protocol { service: &'static str, detail: String },
  #[error("{0} is not configured")]
  NotConfigured(&'static str),
}

/// HTTP client shared by every upstream
pub fn http_client() -> Result<reqwest::Client, ServiceError> {
  Ok(
    reqwest::Client::builder()
      .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
      .build()?,
  )
}

/// Turn a non-2xx response into `ServiceError::Upstream`
pub(crate) async fn check_status(
  service: &'static str,
  response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(ServiceError::Upstream {
    service,
    status: status.as_u16(),
    body,
  })
}
