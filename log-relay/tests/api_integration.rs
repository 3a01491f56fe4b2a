//! Integration tests for the operational REST endpoints
//!
//! Drives the relay's router in-process with `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{TimeZone, Utc};
use log_relay::{
    ConnectionId, FetchResult, LogFetcher, ManualClock, RemoteLog, RemoteLogEntry, Relay,
    RelayConfig, RelayHandle, SubscriptionKey,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

// ============================================================================
// Test Fixtures
// ============================================================================

/// Serves the same two entries on every fetch
struct StaticFetcher;

#[async_trait]
impl LogFetcher for StaticFetcher {
    async fn fetch(&self, _key: &SubscriptionKey) -> FetchResult {
        Ok(RemoteLog::new(vec![
            RemoteLogEntry::new(json!({ "id": 1 })),
            RemoteLogEntry::new(json!({ "id": 2 })),
        ]))
    }
}

fn create_test_relay() -> (Relay<ManualClock>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let relay = Relay::with_parts(RelayConfig::default(), Arc::clone(&clock), Arc::new(StaticFetcher));
    (relay, clock)
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// Register a connection directly with the engine and subscribe it
async fn subscribe(handle: &RelayHandle, key: &str) -> mpsc::UnboundedReceiver<log_relay::ConnectionEvent> {
    let id = ConnectionId::new();
    let (tx, rx) = mpsc::unbounded_channel();
    handle.connect(id, "127.0.0.1", tx).await.unwrap();
    handle
        .subscribe(id, SubscriptionKey::new(key).unwrap())
        .await
        .unwrap();
    rx
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (relay, _clock) = create_test_relay();

    let (status, json) = get_json(relay.router(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["timestamp"], "2024-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (relay, _clock) = create_test_relay();

    let response = relay
        .router()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Status
// ============================================================================

#[tokio::test]
async fn test_status_when_idle() {
    let (relay, _clock) = create_test_relay();

    let (status, json) = get_json(relay.router(), "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["connections"], 0);
    assert_eq!(json["subscriptions"], json!({}));
    assert_eq!(json["pollers"], json!([]));
}

#[tokio::test]
async fn test_status_reports_subscribers_and_pollers() {
    let (relay, clock) = create_test_relay();
    let handle = relay.handle().clone();

    let mut first = subscribe(&handle, "alpha").await;
    let _second = subscribe(&handle, "alpha").await;
    let _third = subscribe(&handle, "beta").await;

    // connected, subscribed, then both entries from the first tick
    for _ in 0..4 {
        tokio::time::timeout(Duration::from_secs(5), first.recv())
            .await
            .unwrap()
            .unwrap();
    }
    clock.advance_millis(1000);

    let (status, json) = get_json(relay.router(), "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["connections"], 3);
    assert_eq!(json["subscriptions"], json!({ "alpha": 2, "beta": 1 }));
    assert_eq!(json["timestamp"], "2024-01-01T00:00:01Z");

    let pollers = json["pollers"].as_array().unwrap();
    assert_eq!(pollers.len(), 2);
    assert_eq!(pollers[0]["key"], "alpha");
    assert_eq!(pollers[0]["cursor"], 2);
    assert_eq!(pollers[0]["failures"], 0);
    assert_eq!(pollers[0]["active"], true);
    assert_eq!(pollers[0]["lastPoll"], "2024-01-01T00:00:00Z");
    assert_eq!(pollers[1]["key"], "beta");
}

#[tokio::test]
async fn test_status_unavailable_after_shutdown() {
    let (relay, _clock) = create_test_relay();
    relay.handle().shutdown().await;

    // the engine drains and exits on its own task
    tokio::time::sleep(Duration::from_millis(50)).await;
    let response = relay
        .router()
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
