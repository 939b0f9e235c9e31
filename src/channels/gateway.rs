use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;

use super::truncate_chars;
use crate::config::ChannelConfig;
use crate::error::DeliveryError;

/// Error bodies echoed into failure reasons are cut to this many characters.
const ERROR_BODY_LIMIT: usize = 512;

/// Long-lived transport handle shared by every backend instance of one channel.
#[derive(Clone)]
pub struct Gateway {
    channel: String,
    endpoint: Option<String>,
    http_client: Client,
}

impl Gateway {
    pub fn new(channel: &str, config: &ChannelConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            channel: channel.to_string(),
            endpoint: config.endpoint.clone(),
            http_client,
        })
    }

    /// Gateway without an endpoint: payloads are logged, never sent.
    #[cfg(test)]
    pub fn dry_run(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            endpoint: None,
            http_client: Client::new(),
        }
    }

    pub async fn deliver(&self, payload: Value) -> Result<(), DeliveryError> {
        let Some(endpoint) = &self.endpoint else {
            tracing::info!(channel = %self.channel, "Dry run, would send: {payload}");
            return Ok(());
        };

        let response = self
            .http_client
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::transmission(&self.channel, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let reason = format!(
            "gateway returned {status}: {}",
            truncate_chars(&body, ERROR_BODY_LIMIT)
        );
        if status.is_client_error() {
            Err(DeliveryError::rejected(&self.channel, reason))
        } else {
            Err(DeliveryError::transmission(&self.channel, reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;

    async fn serve(status: StatusCode) -> String {
        serve_body(status, "gateway says no".to_string()).await
    }

    async fn serve_body(status: StatusCode, body: String) -> String {
        let app = Router::new().route("/", post(move || async move { (status, body) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn gateway(endpoint: Option<String>) -> Gateway {
        let cfg = ChannelConfig {
            endpoint,
            ..ChannelConfig::default()
        };
        Gateway::new("short-message", &cfg).unwrap()
    }

    #[tokio::test]
    async fn test_dry_run_succeeds() {
        let gw = Gateway::dry_run("push-alert");
        assert!(gw.deliver(serde_json::json!({"body": "hi"})).await.is_ok());
    }

    #[tokio::test]
    async fn test_success_status() {
        let gw = gateway(Some(serve(StatusCode::ACCEPTED).await));
        assert!(gw.deliver(serde_json::json!({"body": "hi"})).await.is_ok());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let gw = gateway(Some(serve(StatusCode::SERVICE_UNAVAILABLE).await));
        let err = gw.deliver(serde_json::json!({})).await.unwrap_err();
        assert!(!err.is_permanent());
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let gw = gateway(Some(serve(StatusCode::UNPROCESSABLE_ENTITY).await));
        let err = gw.deliver(serde_json::json!({})).await.unwrap_err();
        assert!(err.is_permanent());
        assert!(err.to_string().contains("gateway says no"));
    }

    #[tokio::test]
    async fn test_long_error_body_is_capped() {
        let endpoint = serve_body(StatusCode::BAD_REQUEST, "e".repeat(2000)).await;
        let gw = gateway(Some(endpoint));
        let err = gw.deliver(serde_json::json!({})).await.unwrap_err();
        let reason = err.to_string();
        assert!(reason.contains(&"e".repeat(ERROR_BODY_LIMIT - 3)));
        assert!(!reason.contains(&"e".repeat(ERROR_BODY_LIMIT)));
        assert!(reason.contains("..."));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let gw = gateway(Some(format!("http://{addr}/")));
        let err = gw.deliver(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, DeliveryError::TransmissionFailure { permanent: false, .. }));
    }
}
