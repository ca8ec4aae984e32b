//! Integration test: start the relay on a free port, GET /, assert health JSON.
//! Does not require the real backend or any identity provider.

mod common;

use lib::identity::UnconfiguredIdentity;
use std::sync::Arc;

#[tokio::test]
async fn relay_health_http_responds_with_running() {
    let backend = common::spawn_backend().await;
    let port = common::spawn_relay(Arc::new(UnconfiguredIdentity), &backend, None).await;

    let url = format!("http://127.0.0.1:{}/", port);
    let resp = reqwest::get(&url).await.expect("GET relay health");
    assert!(resp.status().is_success());
    let json: serde_json::Value = resp.json().await.expect("parse JSON");
    assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
    assert_eq!(json.get("protocol").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
}

#[tokio::test]
async fn message_endpoint_answers_ping_and_bad_frames() {
    let backend = common::spawn_backend().await;
    let port = common::spawn_relay(Arc::new(UnconfiguredIdentity), &backend, None).await;
    let url = format!("http://127.0.0.1:{}/message", port);
    let client = reqwest::Client::new();

    let res: serde_json::Value = client
        .post(&url)
        .body(r#"{"id":"p","action":"ping"}"#)
        .send()
        .await
        .expect("POST ping")
        .json()
        .await
        .expect("ping JSON");
    assert_eq!(res, serde_json::json!({"id": "p", "success": true, "message": "alive"}));

    let resp = client
        .post(&url)
        .body(r#"{"id":"x","action":"explode"}"#)
        .send()
        .await
        .expect("POST bad action");
    assert_eq!(resp.status().as_u16(), 400);
    let res: serde_json::Value = resp.json().await.expect("error JSON");
    assert_eq!(res["success"], false);
    assert_eq!(res["id"], "x");
    assert_eq!(res["error"], "unknown action: explode");
}

#[tokio::test]
async fn token_mode_rejects_missing_token() {
    let backend = common::spawn_backend().await;
    let port = common::spawn_relay(
        Arc::new(UnconfiguredIdentity),
        &backend,
        Some("s3cret".to_string()),
    )
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://127.0.0.1:{}/message", port))
        .body(r#"{"action":"ping"}"#)
        .send()
        .await
        .expect("POST without token");
    assert_eq!(resp.status().as_u16(), 401);

    let resp = client
        .post(format!("http://127.0.0.1:{}/message?token=s3cret", port))
        .body(r#"{"action":"ping"}"#)
        .send()
        .await
        .expect("POST with token");
    assert!(resp.status().is_success());

    let ws = lib::relay::RelayClient::connect(&format!("ws://127.0.0.1:{}/ws", port)).await;
    assert!(ws.is_err(), "upgrade without token must be refused");
}

#[tokio::test]
async fn token_with_reserved_characters_round_trips() {
    let backend = common::spawn_backend().await;
    let token = "a+b&c#d%e f";
    let port = common::spawn_relay(Arc::new(UnconfiguredIdentity), &backend, Some(token.to_string())).await;
    let relay = lib::config::RelayConfig {
        port,
        ..Default::default()
    };

    let res = lib::relay::request_once(&relay.ws_url(Some(token)), &lib::relay::RelayRequest::Ping)
        .await
        .expect("ping with encoded token");
    assert!(res.success);

    let res = lib::relay::request_once(&relay.ws_url(Some("a b")), &lib::relay::RelayRequest::Ping).await;
    assert!(res.is_err(), "wrong token must be refused");
}
