//! Application state shared by all handlers.

use std::sync::Arc;

use crate::analytics::Analytics;
use crate::config::AppConfig;
use crate::services::{AddressLookup, MalwareScanner, Notifier, PaymentGateway};
use crate::session::SessionStore;

/// Application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,

    /// Backend holding every session's answers
    pub sessions: Arc<dyn SessionStore>,

    pub address_lookup: Arc<dyn AddressLookup>,
    pub payments: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub scanner: Arc<dyn MalwareScanner>,

    pub analytics: Analytics,
}
