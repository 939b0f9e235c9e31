use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::dispatcher::Dispatcher;
use crate::error::DeliveryError;
use crate::notification::{DeliveryOutcome, NotificationRequest};
use crate::observers::{AnalyticsObserver, BillingObserver};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub analytics: Arc<AnalyticsObserver>,
    pub billing: Arc<BillingObserver>,
}

#[derive(Serialize)]
pub struct NotifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct UsageRow {
    channel_type: String,
    notification_type: String,
    delivered: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/notify", post(handle_notify))
        .route("/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn handle_notify(
    State(state): State<AppState>,
    Json(req): Json<NotificationRequest>,
) -> impl IntoResponse {
    let outcome = state.dispatcher.dispatch(req).await;
    let status = match outcome.error() {
        None => StatusCode::OK,
        Some(DeliveryError::UnknownChannelType(_)) => StatusCode::BAD_REQUEST,
        Some(DeliveryError::TransmissionFailure { .. }) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(NotifyResponse::from(outcome)))
}

impl From<DeliveryOutcome> for NotifyResponse {
    fn from(outcome: DeliveryOutcome) -> Self {
        match outcome {
            DeliveryOutcome::Delivered => Self {
                success: true,
                error: None,
            },
            DeliveryOutcome::Failed(e) => Self {
                success: false,
                error: Some(ErrorBody {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            },
        }
    }
}

async fn handle_stats(State(state): State<AppState>) -> impl IntoResponse {
    let usage: Vec<_> = state
        .analytics
        .snapshot()
        .into_iter()
        .map(|(channel_type, notification_type, delivered)| UsageRow {
            channel_type,
            notification_type,
            delivered,
        })
        .collect();
    Json(serde_json::json!({
        "usage": usage,
        "charges": state.billing.charges(),
        "billed_total": state.billing.total(),
    }))
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "channels": state.dispatcher.channel_types(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelBackend;
    use serde_json::Value;
    use std::collections::BTreeMap;

    struct Down;

    #[async_trait::async_trait]
    impl ChannelBackend for Down {
        async fn transmit(&self, request: &NotificationRequest) -> DeliveryOutcome {
            DeliveryOutcome::Failed(DeliveryError::transmission(request.channel_type(), "down"))
        }
    }

    struct Up;

    #[async_trait::async_trait]
    impl ChannelBackend for Up {
        async fn transmit(&self, _request: &NotificationRequest) -> DeliveryOutcome {
            DeliveryOutcome::Delivered
        }
    }

    async fn spawn_api() -> String {
        let analytics = Arc::new(AnalyticsObserver::new());
        let billing = Arc::new(BillingObserver::new(BTreeMap::from([(
            "direct-message".to_string(),
            0.5,
        )])));
        let dispatcher = Dispatcher::builder()
            .register_channel("direct-message", || Box::new(Up))
            .register_channel("short-message", || Box::new(Down))
            .register_observer(analytics.clone())
            .register_observer(billing.clone())
            .build();
        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            analytics,
            billing,
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn notify(base: &str, body: Value) -> (u16, Value) {
        let resp = reqwest::Client::new()
            .post(format!("{base}/notify"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_notify_success_updates_stats() {
        let base = spawn_api().await;
        let (status, body) = notify(
            &base,
            serde_json::json!({
                "recipient": "user@x.com",
                "message": "Hello",
                "channel_type": "direct-message",
                "notification_type": "welcome",
                "metadata": {"subject": "Hi"}
            }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, serde_json::json!({"success": true}));

        let stats: Value = reqwest::get(format!("{base}/stats"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["usage"][0]["notification_type"], "welcome");
        assert_eq!(stats["usage"][0]["delivered"], 1);
        assert_eq!(stats["billed_total"], 0.5);
        let charge = &stats["charges"][0];
        assert_eq!(charge["recipient"], "user@x.com");
        assert_eq!(charge["channel_type"], "direct-message");
        assert_eq!(charge["notification_type"], "welcome");
        assert_eq!(charge["amount"], 0.5);
        assert!(charge["at"].is_string());
    }

    #[tokio::test]
    async fn test_notify_unknown_channel() {
        let base = spawn_api().await;
        let (status, body) = notify(
            &base,
            serde_json::json!({"recipient": "abc", "message": "Hi", "channel_type": "carrier-pigeon"}),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "unknown_channel_type");
    }

    #[tokio::test]
    async fn test_notify_transmission_failure() {
        let base = spawn_api().await;
        let (status, body) = notify(
            &base,
            serde_json::json!({"recipient": "+1555", "message": "Urgent", "channel_type": "short-message"}),
        )
        .await;
        assert_eq!(status, 502);
        assert_eq!(body["error"]["kind"], "transmission_failure");
    }

    #[tokio::test]
    async fn test_health_lists_channels() {
        let base = spawn_api().await;
        let health: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(
            health["channels"],
            serde_json::json!(["direct-message", "short-message"])
        );
    }
}
