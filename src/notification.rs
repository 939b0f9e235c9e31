use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

pub const DEFAULT_NOTIFICATION_TYPE: &str = "general";

// --- Request ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for MetaValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// A fully formed notification, addressed to an already-resolved recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    recipient: String,
    message: String,
    channel_type: String,
    #[serde(default = "default_notification_type")]
    notification_type: String,
    #[serde(default)]
    metadata: BTreeMap<String, MetaValue>,
}

fn default_notification_type() -> String {
    DEFAULT_NOTIFICATION_TYPE.into()
}

impl NotificationRequest {
    pub fn new(
        recipient: impl Into<String>,
        message: impl Into<String>,
        channel_type: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            message: message.into(),
            channel_type: channel_type.into(),
            notification_type: default_notification_type(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, notification_type: impl Into<String>) -> Self {
        self.notification_type = notification_type.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn channel_type(&self) -> &str {
        &self.channel_type
    }

    pub fn notification_type(&self) -> &str {
        &self.notification_type
    }

    pub fn metadata(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    /// Metadata value rendered as text; numbers print without a trailing `.0`.
    pub fn metadata_string(&self, key: &str) -> Option<String> {
        self.metadata(key).map(ToString::to_string)
    }
}

// --- Outcome ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn error(&self) -> Option<&DeliveryError> {
        match self {
            Self::Delivered => None,
            Self::Failed(e) => Some(e),
        }
    }
}

impl From<Result<(), DeliveryError>> for DeliveryOutcome {
    fn from(result: Result<(), DeliveryError>) -> Self {
        match result {
            Ok(()) => Self::Delivered,
            Err(e) => Self::Failed(e),
        }
    }
}

// --- Event ---

/// Emitted once per successful delivery and shared read-only with every observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryEvent {
    pub recipient: String,
    pub channel_type: String,
    pub notification_type: String,
    pub timestamp: DateTime<Local>,
}

impl DeliveryEvent {
    pub fn from_request(request: &NotificationRequest, timestamp: DateTime<Local>) -> Self {
        Self {
            recipient: request.recipient.clone(),
            channel_type: request.channel_type.clone(),
            notification_type: request.notification_type.clone(),
            timestamp,
        }
    }
}
