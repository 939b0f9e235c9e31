use serde_json::json;

use super::{ChannelBackend, Gateway, truncate_chars};
use crate::notification::{DeliveryOutcome, NotificationRequest};

const BODY_LIMIT: usize = 256;
const DEFAULT_TITLE: &str = "New notification";

pub struct PushAlertChannel {
    gateway: Gateway,
}

impl PushAlertChannel {
    pub const TYPE: &'static str = "push-alert";

    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl ChannelBackend for PushAlertChannel {
    async fn transmit(&self, request: &NotificationRequest) -> DeliveryOutcome {
        let title = request
            .metadata_string("title")
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let mut payload = json!({
            "channel": Self::TYPE,
            "device": request.recipient(),
            "title": title,
            "body": truncate_chars(request.message(), BODY_LIMIT),
        });
        if let Some(badge) = request.metadata("badge") {
            payload["badge"] = json!(badge);
        }
        self.gateway.deliver(payload).await.into()
    }
}
