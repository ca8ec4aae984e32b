//! WebSocket client for the relay, used by the CLI and the desktop app.

use super::protocol::{RelayRequest, RelayResponse};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

#[derive(Debug, thiserror::Error)]
pub enum RelayClientError {
    #[error("relay connection failed: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("relay closed the connection before responding")]
    Closed,
}

/// One WebSocket connection to the relay. Requests are sent one at a time; each call waits
/// for the response carrying its id and skips event frames.
pub struct RelayClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}

impl RelayClient {
    pub async fn connect(url: &str) -> Result<Self, RelayClientError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(Self { ws, next_id: 1 })
    }

    pub async fn request(&mut self, request: &RelayRequest) -> Result<RelayResponse, RelayClientError> {
        let id = self.next_id.to_string();
        self.next_id += 1;
        self.ws
            .send(Message::Text(request.to_frame(&id).to_string()))
            .await?;

        while let Some(msg) = self.ws.next().await {
            let Message::Text(text) = msg? else { continue };
            let value: serde_json::Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if value.get("type").and_then(|t| t.as_str()) == Some("event") {
                if value.get("event").and_then(|e| e.as_str()) == Some("shutdown") {
                    return Err(RelayClientError::Closed);
                }
                continue;
            }
            let Ok(res) = serde_json::from_value::<RelayResponse>(value) else { continue };
            if res.id.as_deref() == Some(id.as_str()) {
                return Ok(res);
            }
            log::debug!("relay client: ignoring response for id {:?}", res.id);
        }
        Err(RelayClientError::Closed)
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Connect, send one request, wait for its response, close.
pub async fn request_once(url: &str, request: &RelayRequest) -> Result<RelayResponse, RelayClientError> {
    let mut client = RelayClient::connect(url).await?;
    let res = client.request(request).await;
    client.close().await;
    res
}
