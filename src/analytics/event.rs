//! Analytics event types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An analytics event with the time it happened.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
}

impl AnalyticsEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
        }
    }
}

/// Types of events that can be tracked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    /// A tracked question was answered
    Answer {
        /// Part of the service, e.g. "Eligibility checker"
        category: String,
        /// Question as asked
        action: String,
        /// Chosen answer
        label: String,
    },
    /// An upload failed one of its checks
    UploadRejected {
        kind: String,
        reason: String,
    },
    PaymentCreated {
        reference: String,
        amount: u32,
    },
    /// The payment provider reported back
    PaymentOutcome {
        status: String,
        code: Option<String>,
    },
    ApplicationSubmitted {
        item_type: String,
        reference: String,
    },
}

impl EventType {
    /// Event name sent to the measurement endpoint
    pub fn name(&self) -> &'static str {
        match self {
            EventType::Answer { .. } => "answer",
            EventType::UploadRejected { .. } => "upload_rejected",
            EventType::PaymentCreated { .. } => "payment_created",
            EventType::PaymentOutcome { .. } => "payment_outcome",
            EventType::ApplicationSubmitted { .. } => "application_submitted",
        }
    }

    /// Event fields without the `type` tag
    pub fn params(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.remove("type");
        }
        value
    }
}
