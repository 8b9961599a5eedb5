//! Test harness: the real router wired to in-process fakes.
//!
//! Every request made through [`TestApp`] carries the same session cookie, so
//! answers can be seeded before a request and inspected after it.

use async_trait::async_trait;
use axum::http::{header, HeaderValue};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::analytics::{Analytics, AnalyticsEvent};
use crate::config::{AppConfig, SessionBackend};
use crate::routes;
use crate::services::{
  Address, AddressLookup, CreatedPayment, Email, MalwareScanner, NewPayment, Notifier, PaymentGateway,
  PaymentState, ServiceError,
};
use crate::session::{MemoryStore, SESSION_COOKIE_NAME};
use crate::state::AppState;
use crate::uploads::FILE_FIELD;

/// Session id sent with every request
pub const SESSION_ID: &str = "abcdefghijklmnopqrstuvwxyz012345";

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
pub struct FakeAddressLookup {
  addresses: Mutex<Vec<Address>>,
  failing: AtomicBool,
}

impl FakeAddressLookup {
  pub fn set_addresses(&self, addresses: Vec<Address>) {
    *self.addresses.lock().unwrap() = addresses;
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }
}

#[async_trait]
impl AddressLookup for FakeAddressLookup {
  async fn find_by_postcode(&self, _postcode: &str) -> Result<Vec<Address>, ServiceError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(ServiceError::Upstream {
        service: "address lookup",
        status: 503,
        body: String::new(),
      });
    }
    Ok(self.addresses.lock().unwrap().clone())
  }
}

/// Records created payments; every lookup returns the state last set
pub struct FakePayments {
  created: Mutex<Vec<NewPayment>>,
  state: Mutex<PaymentState>,
}

impl Default for FakePayments {
  fn default() -> Self {
    Self {
      created: Mutex::new(Vec::new()),
      state: Mutex::new(PaymentState {
        status: "created".into(),
        ..Default::default()
      }),
    }
  }
}

impl FakePayments {
  pub fn created(&self) -> Vec<NewPayment> {
    self.created.lock().unwrap().clone()
  }

  pub fn set_state(&self, status: &str, code: Option<&str>) {
    *self.state.lock().unwrap() = PaymentState {
      status: status.to_string(),
      finished: status != "created" && status != "started",
      code: code.map(str::to_string),
      message: None,
    };
  }
}

#[async_trait]
impl PaymentGateway for FakePayments {
  async fn create_payment(&self, payment: &NewPayment) -> Result<CreatedPayment, ServiceError> {
    let mut created = self.created.lock().unwrap();
    created.push(payment.clone());
    let payment_id = format!("pay-{}", created.len());
    Ok(CreatedPayment {
      next_url: format!("https://pay.example/next/{}", payment_id),
      payment_id,
    })
  }

  async fn lookup_payment(&self, _payment_id: &str) -> Result<PaymentState, ServiceError> {
    Ok(self.state.lock().unwrap().clone())
  }
}

#[derive(Default)]
pub struct FakeNotifier {
  sent: Mutex<Vec<Email>>,
  failing: AtomicBool,
}

impl FakeNotifier {
  /// Emails delivered so far, in order
  pub fn sent(&self) -> Vec<Email> {
    self.sent.lock().unwrap().clone()
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }
}

#[async_trait]
impl Notifier for FakeNotifier {
  async fn send_email(&self, email: &Email) -> Result<(), ServiceError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(ServiceError::Upstream {
        service: "GOV.UK Notify",
        status: 500,
        body: "boom".into(),
      });
    }
    self.sent.lock().unwrap().push(email.clone());
    Ok(())
  }
}

#[derive(Default)]
pub struct FakeScanner {
  infected: AtomicBool,
}

impl FakeScanner {
  pub fn set_infected(&self, infected: bool) {
    self.infected.store(infected, Ordering::SeqCst);
  }
}

#[async_trait]
impl MalwareScanner for FakeScanner {
  async fn is_infected(&self, _name: &str, _bytes: &[u8]) -> Result<bool, ServiceError> {
    Ok(self.infected.load(Ordering::SeqCst))
  }
}

// ============================================================================
// Test app
// ============================================================================

fn test_config() -> AppConfig {
  let mut config = AppConfig::default();
  config.session.backend = SessionBackend::Memory;
  config.upload.max_file_size_mb = 1;
  let templates = &mut config.notify.templates;
  templates.applicant_section_2 = "applicant-section-2".into();
  templates.applicant_section_10 = "applicant-section-10".into();
  templates.owner_section_2 = "owner-section-2".into();
  templates.owner_section_10 = "owner-section-10".into();
  config
}

pub struct TestApp {
  pub server: TestServer,
  pub state: AppState,
  pub lookup: Arc<FakeAddressLookup>,
  pub payments: Arc<FakePayments>,
  pub notifier: Arc<FakeNotifier>,
  pub scanner: Arc<FakeScanner>,
  events: Arc<Mutex<Vec<AnalyticsEvent>>>,
}

impl TestApp {
  pub fn new() -> Self {
    let config = test_config();
    let lookup = Arc::new(FakeAddressLookup::default());
    let payments = Arc::new(FakePayments::default());
    let notifier = Arc::new(FakeNotifier::default());
    let scanner = Arc::new(FakeScanner::default());
    let (analytics, events) = Analytics::recording();

    let state = AppState {
      sessions: Arc::new(MemoryStore::new(config.session.ttl_hours)),
      config: Arc::new(config),
      address_lookup: lookup.clone(),
      payments: payments.clone(),
      notifier: notifier.clone(),
      scanner: scanner.clone(),
      analytics,
    };
    let server = TestServer::new(routes::router(state.clone())).expect("Failed to start test server");

    Self {
      server,
      state,
      lookup,
      payments,
      notifier,
      scanner,
      events,
    }
  }

  fn cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE_NAME, SESSION_ID)).expect("valid cookie header")
  }

  pub async fn get(&self, path: &str) -> TestResponse {
    self.server.get(path).add_header(header::COOKIE, Self::cookie()).await
  }

  pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> TestResponse {
    self
      .server
      .post(path)
      .add_header(header::COOKIE, Self::cookie())
      .form(&form)
      .await
  }

  /// Multipart POST of one file in the `files` field
  pub async fn upload(&self, path: &str, name: &str, bytes: Vec<u8>) -> TestResponse {
    let form = MultipartForm::new().add_part(FILE_FIELD, Part::bytes(bytes).file_name(name));
    self
      .server
      .post(path)
      .add_header(header::COOKIE, Self::cookie())
      .multipart(form)
      .await
  }

  /// Store answers directly, bypassing the pages
  pub async fn seed(&self, answers: &[(&str, &str)]) {
    for (key, value) in answers {
      self.state.sessions.set(SESSION_ID, key, value).await.unwrap();
    }
  }

  pub async fn answer(&self, key: &str) -> Option<String> {
    self.state.sessions.get(SESSION_ID, key).await.unwrap()
  }

  /// Analytics events tracked so far
  pub fn events(&self) -> Vec<AnalyticsEvent> {
    self.events.lock().unwrap().clone()
  }

  /// `Location` header of a redirect
  pub fn location(response: &TestResponse) -> String {
    response.header(header::LOCATION).to_str().unwrap().to_string()
  }
}
