//! Relay HTTP + WebSocket server (single port).

use super::handler::{Dispatch, Relay};
use super::protocol::{parse_frame, RelayResponse, PROTOCOL_VERSION, SHUTDOWN_EVENT_JSON};
use crate::api::BackendClient;
use crate::config::{self, Config};
use crate::identity::{self, TokenProvider};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

/// Outbound responses buffered per WebSocket connection while earlier frames are being written.
const WS_OUTBOUND_BUFFER: usize = 64;

/// Shared state for the relay routes.
#[derive(Clone)]
pub struct RelayState {
    pub relay: Relay,
    /// When Some, /ws and /message must carry `?token=` matching this.
    pub required_token: Option<String>,
    pub port: u16,
    /// Broadcasts events to connected clients (e.g. shutdown).
    pub event_tx: broadcast::Sender<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    token: Option<String>,
}

impl RelayState {
    fn authorized(&self, query: &TokenQuery) -> bool {
        self.required_token.as_ref().map_or(true, |required| {
            query.token.as_deref().map_or(false, |t| t.trim() == required)
        })
    }
}

/// When auth mode is token, the configured token; errors if the mode is token but no token is set.
fn require_token(config: &Config) -> Result<Option<String>> {
    if config.relay.auth.mode != config::RelayAuthMode::Token {
        return Ok(None);
    }
    match config::resolve_relay_token(config) {
        Some(t) => Ok(Some(t)),
        None => anyhow::bail!(
            "relay.auth.mode is \"token\" but no token is configured (set relay.auth.token or CANVASQA_RELAY_TOKEN)"
        ),
    }
}

/// Build the relay from config, bind the configured address and serve until SIGINT/SIGTERM.
pub async fn run_relay(config: Config) -> Result<()> {
    let bind = config.relay.bind.trim().to_string();
    let required_token = require_token(&config)?;
    if !config::is_loopback_bind(&bind) && required_token.is_none() {
        anyhow::bail!(
            "refusing to bind relay to {} without auth (set relay.auth.mode to \"token\" and relay.auth.token or CANVASQA_RELAY_TOKEN)",
            bind
        );
    }

    let tokens = TokenProvider::new(identity::identity_from_config(&config));
    let backend = BackendClient::from_config(&config);
    log::info!("relay: backend at {}", backend.api_base_url());
    let relay = Relay::new(tokens, backend);

    let bind_addr = format!("{}:{}", bind, config.relay.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("relay listening on {}", bind_addr);

    let (event_tx, _) = broadcast::channel(16);
    serve_relay(listener, relay, required_token, event_tx.clone(), shutdown_signal(event_tx)).await?;
    log::info!("relay stopped");
    Ok(())
}

/// Serve the relay on an already-bound listener until `shutdown` completes.
pub async fn serve_relay<F>(
    listener: TcpListener,
    relay: Relay,
    required_token: Option<String>,
    event_tx: broadcast::Sender<String>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let port = listener.local_addr().context("reading relay address")?.port();
    let state = RelayState {
        relay,
        required_token,
        port,
        event_tx,
    };
    let app = Router::new()
        .route("/", get(health_http))
        .route("/message", post(message_http))
        .route("/ws", get(ws_handler))
        .with_state(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("relay server exited")
}

/// Completes on SIGINT or SIGTERM, after broadcasting a shutdown event to WebSocket clients.
async fn shutdown_signal(event_tx: broadcast::Sender<String>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("installing Ctrl+C handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("installing SIGTERM handler failed: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, notifying clients");
    let _ = event_tx.send(SHUTDOWN_EVENT_JSON.to_string());
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<RelayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "protocol": PROTOCOL_VERSION,
        "port": state.port,
    }))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(RelayResponse::failure("unauthorized: relay token mismatch")),
    )
        .into_response()
}

/// POST /message: one request frame in, one response out.
async fn message_http(
    State(state): State<RelayState>,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Response {
    if !state.authorized(&query) {
        return unauthorized();
    }
    let text = String::from_utf8_lossy(&body);
    let res = match parse_frame(&text) {
        Ok((id, req)) => state.relay.dispatch(req).resolve().await.with_id(id),
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RelayResponse::failure(e.error).with_id(e.id)),
            )
                .into_response()
        }
    };
    Json(res).into_response()
}

/// GET /ws upgrades to WebSocket after the token check.
async fn ws_handler(
    State(state): State<RelayState>,
    Query(query): Query<TokenQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.authorized(&query) {
        return unauthorized();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Each request is dispatched on its own task; finished responses are funneled back through
/// `out_rx` so every request gets exactly one frame, tagged with its id, in completion order.
async fn handle_socket(mut socket: WebSocket, state: RelayState) {
    let mut event_rx = state.event_tx.subscribe();
    let (out_tx, mut out_rx) = mpsc::channel::<RelayResponse>(WS_OUTBOUND_BUFFER);

    loop {
        tokio::select! {
            biased;

            event = event_rx.recv() => {
                match event {
                    Ok(text) => {
                        let is_shutdown = text == SHUTDOWN_EVENT_JSON;
                        let _ = socket.send(Message::Text(text)).await;
                        if is_shutdown {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::debug!("ws client lagged {} broadcast messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            Some(res) = out_rx.recv() => {
                if socket.send(Message::Text(res.to_json())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let text = match msg {
                    Message::Text(t) => t,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let res = match parse_frame(&text) {
                    Ok((id, req)) => match state.relay.dispatch(req) {
                        Dispatch::Immediate(res) => res.with_id(id),
                        Dispatch::Deferred(fut) => {
                            let tx = out_tx.clone();
                            tokio::spawn(async move {
                                let res = fut.await.with_id(id);
                                if tx.send(res).await.is_err() {
                                    log::debug!("ws client gone before response was ready");
                                }
                            });
                            continue;
                        }
                    },
                    Err(e) => {
                        log::debug!("ws bad frame: {}", e.error);
                        RelayResponse::failure(e.error).with_id(e.id)
                    }
                };
                if socket.send(Message::Text(res.to_json())).await.is_err() {
                    break;
                }
            }
        }
    }
    log::debug!("ws client disconnected");
}
