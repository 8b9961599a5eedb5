//! Fire-and-forget analytics.
//!
//! An [`Analytics`] value is built once at start-up and carried in the
//! application state. Every event becomes a structured `tracing` line; when
//! GA4 Measurement Protocol credentials are configured the event is also
//! posted from a detached task. Failures never reach the user.

mod event;

pub use event::{AnalyticsEvent, EventType};

use serde_json::json;
use std::sync::Arc;

use crate::config::AnalyticsConfig;
use crate::error::LogOnError;

const MEASUREMENT_URL: &str = "https://www.google-analytics.com/mp/collect";

#[derive(Clone)]
enum Backend {
    /// tracing only
    Log,
    Measurement(Arc<MeasurementClient>),
    #[cfg(test)]
    Recording(Arc<std::sync::Mutex<Vec<AnalyticsEvent>>>),
}

struct MeasurementClient {
    http: reqwest::Client,
    measurement_id: String,
    api_secret: String,
}

impl MeasurementClient {
    async fn send(&self, client_id: &str, event: &AnalyticsEvent) -> Result<(), reqwest::Error> {
        let body = json!({
            "client_id": client_id,
            "timestamp_micros": event.timestamp.timestamp_micros(),
            "events": [{
                "name": event.event_type.name(),
                "params": event.event_type.params(),
            }],
        });
        self.http
            .post(MEASUREMENT_URL)
            .query(&[
                ("measurement_id", self.measurement_id.as_str()),
                ("api_secret", self.api_secret.as_str()),
            ])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Analytics {
    backend: Backend,
}

impl Analytics {
    /// Log-only analytics
    pub fn log_only() -> Self {
        Self { backend: Backend::Log }
    }

    pub fn from_config(config: &AnalyticsConfig, http: reqwest::Client) -> Self {
        if !config.is_enabled() {
            tracing::info!("Analytics measurement not configured, events will be logged only");
            return Self::log_only();
        }
        Self {
            backend: Backend::Measurement(Arc::new(MeasurementClient {
                http,
                measurement_id: config.measurement_id.clone(),
                api_secret: config.api_secret.clone(),
            })),
        }
    }

    /// Analytics that keeps every event in memory for assertions
    #[cfg(test)]
    pub fn recording() -> (Self, Arc<std::sync::Mutex<Vec<AnalyticsEvent>>>) {
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let analytics = Self {
            backend: Backend::Recording(events.clone()),
        };
        (analytics, events)
    }

    /// Record an event for a session. Never blocks on the network.
    pub fn track(&self, session_id: &str, event_type: EventType) {
        let event = AnalyticsEvent::new(event_type);
        if let Ok(json) = serde_json::to_string(&event) {
            tracing::info!(target: "analytics", "{}", json);
        }

        match &self.backend {
            Backend::Log => {}
            Backend::Measurement(client) => {
                let client = client.clone();
                let client_id = session_id.to_string();
                tokio::spawn(async move {
                    client
                        .send(&client_id, &event)
                        .await
                        .log_warn("Failed to send analytics event");
                });
            }
            #[cfg(test)]
            Backend::Recording(events) => {
                if let Ok(mut events) = events.lock() {
                    events.push(event);
                }
            }
        }
    }
}
