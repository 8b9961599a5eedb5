use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ivory_service::analytics::Analytics;
use ivory_service::config::{AppConfig, SessionBackend, UPSTREAM_TIMEOUT_SECS};
use ivory_service::routes;
use ivory_service::services::{
  self, AddressLookupClient, ClamdScanner, DisabledNotifier, DisabledScanner, GovPayClient, MalwareScanner, Notifier,
  NotifyClient,
};
use ivory_service::session::{MemoryStore, SessionStore, SqliteStore};
use ivory_service::state::AppState;

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ivory_service=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = AppConfig::load().expect("Failed to load configuration");

  let sessions: Arc<dyn SessionStore> = match config.session.backend {
    SessionBackend::Memory => {
      tracing::warn!("Using in-memory sessions; answers are lost on restart");
      Arc::new(MemoryStore::new(config.session.ttl_hours))
    }
    SessionBackend::Sqlite => {
      let path = Path::new(&config.session.path);
      if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create session directory");
      }
      Arc::new(SqliteStore::open(path, config.session.ttl_hours).expect("Failed to open session database"))
    }
  };

  let http = services::http_client().expect("Failed to build HTTP client");

  let notifier: Arc<dyn Notifier> = if config.notify.api_key.is_empty() {
    tracing::warn!("NOTIFY_API_KEY not set, confirmation emails are disabled");
    Arc::new(DisabledNotifier)
  } else {
    Arc::new(
      NotifyClient::new(http.clone(), &config.notify.api_url, &config.notify.api_key)
        .expect("Invalid Notify API key"),
    )
  };

  let scanner: Arc<dyn MalwareScanner> = if config.antimalware.enabled {
    Arc::new(ClamdScanner::new(
      &config.antimalware.host,
      config.antimalware.port,
      Duration::from_secs(UPSTREAM_TIMEOUT_SECS),
    ))
  } else {
    Arc::new(DisabledScanner)
  };

  let state = AppState {
    sessions,
    address_lookup: Arc::new(AddressLookupClient::new(
      http.clone(),
      &config.address_lookup.url,
      &config.address_lookup.api_key,
    )),
    payments: Arc::new(GovPayClient::new(http.clone(), &config.payment.api_url, &config.payment.api_key)),
    notifier,
    scanner,
    analytics: Analytics::from_config(&config.analytics, http),
    config: Arc::new(config),
  };

  let bind_addr = state.config.bind_addr();
  let app = routes::router(state);

  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on http://{}", bind_addr);

  axum::serve(listener, app)
    .await
    .expect("Server failed to start");
}
