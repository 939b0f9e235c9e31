use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::Value;

use super::Gateway;
use crate::config::ChannelConfig;

type Captured = Arc<Mutex<Vec<Value>>>;

async fn record(State(store): State<Captured>, Json(payload): Json<Value>) -> StatusCode {
    store.lock().unwrap().push(payload);
    StatusCode::OK
}

/// Gateway pointed at a local server that keeps every payload it receives.
pub async fn capturing_gateway(channel: &str) -> (Gateway, Captured) {
    let store = Captured::default();
    let app = Router::new()
        .route("/", post(record))
        .with_state(store.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let cfg = ChannelConfig {
        endpoint: Some(format!("http://{addr}/")),
        ..ChannelConfig::default()
    };
    (Gateway::new(channel, &cfg).unwrap(), store)
}

pub fn keys(payload: &Value) -> Vec<&str> {
    let mut keys: Vec<_> = payload
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    keys.sort_unstable();
    keys
}
