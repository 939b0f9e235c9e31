use serde_json::json;

use super::{ChannelBackend, Gateway};
use crate::notification::{DeliveryOutcome, NotificationRequest};

const DEFAULT_SUBJECT: &str = "Notification";

/// Direct messages (mail-like): carry a subject line taken from the `subject` metadata key.
pub struct DirectMessageChannel {
    gateway: Gateway,
}

impl DirectMessageChannel {
    pub const TYPE: &'static str = "direct-message";

    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl ChannelBackend for DirectMessageChannel {
    async fn transmit(&self, request: &NotificationRequest) -> DeliveryOutcome {
        let subject = request
            .metadata_string("subject")
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
        let payload = json!({
            "channel": Self::TYPE,
            "to": request.recipient(),
            "subject": subject,
            "body": request.message(),
        });
        self.gateway.deliver(payload).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::testing::{capturing_gateway, keys};

    #[tokio::test]
    async fn test_subject_from_metadata() {
        let (gateway, sent) = capturing_gateway(DirectMessageChannel::TYPE).await;
        let channel = DirectMessageChannel::new(gateway);
        let req = NotificationRequest::new("user@x.com", "Hello", DirectMessageChannel::TYPE)
            .with_metadata("subject", "Welcome aboard")
            .with_metadata("color", "blue");

        assert!(channel.transmit(&req).await.is_success());

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["to"], "user@x.com");
        assert_eq!(sent[0]["subject"], "Welcome aboard");
        assert_eq!(sent[0]["body"], "Hello");
        // unrecognized metadata is not forwarded
        assert_eq!(keys(&sent[0]), vec!["body", "channel", "subject", "to"]);
    }

    #[tokio::test]
    async fn test_numeric_subject_is_kept() {
        let (gateway, sent) = capturing_gateway(DirectMessageChannel::TYPE).await;
        let channel = DirectMessageChannel::new(gateway);
        let req = NotificationRequest::new("user@x.com", "Report", DirectMessageChannel::TYPE)
            .with_metadata("subject", 2024.0);

        assert!(channel.transmit(&req).await.is_success());
        assert_eq!(sent.lock().unwrap()[0]["subject"], "2024");
    }

    #[tokio::test]
    async fn test_default_subject() {
        let (gateway, sent) = capturing_gateway(DirectMessageChannel::TYPE).await;
        let channel = DirectMessageChannel::new(gateway);
        let req = NotificationRequest::new("user@x.com", "Hello", DirectMessageChannel::TYPE);

        assert!(channel.transmit(&req).await.is_success());
        assert_eq!(sent.lock().unwrap()[0]["subject"], DEFAULT_SUBJECT);
    }
}
