//! Shared helpers: a mock backend and an in-process relay, both on ephemeral loopback ports.

use axum::{http::StatusCode, routing::post, Json, Router};
use lib::api::BackendClient;
use lib::identity::{IdentityService, TokenProvider};
use lib::relay::{serve_relay, Relay};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Delay applied by the mock query endpoint when the query text is "slow".
pub const SLOW_QUERY_DELAY: Duration = Duration::from_millis(300);

async fn query(Json(body): Json<Value>) -> Json<Value> {
    let q = body.get("query").and_then(|v| v.as_str()).unwrap_or("").to_string();
    if q == "slow" {
        tokio::time::sleep(SLOW_QUERY_DELAY).await;
    }
    Json(json!({
        "echo": q,
        "google_token": body.get("google_token").cloned().unwrap_or(Value::Null),
        "has_timestamp": body.get("timestamp").and_then(|v| v.as_str()).is_some(),
    }))
}

async fn courses(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let token = body
        .pointer("/canvas_tokens/access_token")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if token.is_empty() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing_canvas_token", "message": "Canvas authentication required"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"courses": [
            {"id": 1, "name": "Intro CS", "course_code": "CS101"},
            {"name": "no id"}
        ]})),
    )
}

async fn ask(Json(body): Json<Value>) -> Json<Value> {
    let question = body.get("question").and_then(|v| v.as_str()).unwrap_or("");
    let course = body.pointer("/context/courses/0").and_then(|v| v.as_str()).unwrap_or("");
    Json(json!({"status": "success", "message": format!("{} / {}", course, question)}))
}

/// Start the mock backend; returns its base URL.
pub async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/query", post(query))
        .route("/api/courses", post(courses))
        .route("/api/ask", post(ask))
        .route(
            "/api/health",
            axum::routing::get(|| async { Json(json!({"ok": true})) }),
        )
        .route(
            "/status/500",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error") }),
        )
        .route(
            "/status/502",
            post(|| async {
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({"error": "backend_unreachable", "details": "connection refused"})),
                )
            }),
        )
        .route("/html", post(|| async { "<html>not json</html>" }))
        .route("/empty", post(|| async { "" }))
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
    let addr = listener.local_addr().expect("backend addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

pub fn backend_client(base: &str) -> BackendClient {
    BackendClient::new(
        Some(base.to_string()),
        Some(format!("{}/query", base)),
        Some(Duration::from_secs(2)),
    )
}

/// Start a relay on a free port. Returns its port; the task runs until the test ends.
pub async fn spawn_relay(
    identity: Arc<dyn IdentityService>,
    backend_base: &str,
    required_token: Option<String>,
) -> u16 {
    let relay = Relay::new(TokenProvider::new(identity), backend_client(backend_base));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
    let port = listener.local_addr().expect("relay addr").port();
    let (event_tx, _) = broadcast::channel(4);
    tokio::spawn(async move {
        let _ = serve_relay(listener, relay, required_token, event_tx, std::future::pending()).await;
    });
    port
}
