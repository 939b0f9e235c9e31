use serde_json::json;

use super::{ChannelBackend, Gateway, truncate_chars};
use crate::notification::{DeliveryOutcome, NotificationRequest};

/// Bodies longer than this are truncated, never rejected.
pub const BODY_LIMIT: usize = 160;

pub struct ShortMessageChannel {
    gateway: Gateway,
}

impl ShortMessageChannel {
    pub const TYPE: &'static str = "short-message";

    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl ChannelBackend for ShortMessageChannel {
    async fn transmit(&self, request: &NotificationRequest) -> DeliveryOutcome {
        let body = truncate_chars(request.message(), BODY_LIMIT);
        if body.len() != request.message().len() {
            tracing::debug!(
                recipient = request.recipient(),
                "Message truncated to {BODY_LIMIT} characters"
            );
        }
        let payload = json!({
            "channel": Self::TYPE,
            "to": request.recipient(),
            "body": body,
        });
        self.gateway.deliver(payload).await.into()
    }
}
