//! Request dispatch: each request kind maps to an immediate response or a future that
//! resolves to exactly one response.

use super::protocol::{RelayRequest, RelayResponse};
use crate::api::BackendClient;
use crate::identity::{AuthError, TokenProvider};
use futures_util::future::BoxFuture;

/// How a request will be answered.
pub enum Dispatch {
    /// Answer is ready now (no asynchronous work).
    Immediate(RelayResponse),
    /// Answer arrives when the future completes; the transport awaits it before replying.
    Deferred(BoxFuture<'static, RelayResponse>),
}

impl Dispatch {
    pub fn is_immediate(&self) -> bool {
        matches!(self, Dispatch::Immediate(_))
    }

    /// Wait for the response regardless of kind.
    pub async fn resolve(self) -> RelayResponse {
        match self {
            Dispatch::Immediate(res) => res,
            Dispatch::Deferred(fut) => fut.await,
        }
    }
}

/// Stateless forwarder between UI surfaces, the identity service and the backend.
#[derive(Clone)]
pub struct Relay {
    tokens: TokenProvider,
    backend: BackendClient,
}

fn token_response(result: Result<String, AuthError>) -> RelayResponse {
    match result {
        Ok(token) => RelayResponse::token(token),
        Err(e) => RelayResponse::failure(e.to_string()),
    }
}

impl Relay {
    pub fn new(tokens: TokenProvider, backend: BackendClient) -> Self {
        Self { tokens, backend }
    }

    pub fn dispatch(&self, request: RelayRequest) -> Dispatch {
        log::debug!("relay: dispatch {}", request.action());
        match request {
            RelayRequest::Ping => Dispatch::Immediate(RelayResponse::alive()),
            RelayRequest::StartOAuth => {
                let tokens = self.tokens.clone();
                Dispatch::Deferred(Box::pin(async move {
                    token_response(tokens.acquire_token(true).await)
                }))
            }
            RelayRequest::CheckAuth => {
                let tokens = self.tokens.clone();
                Dispatch::Deferred(Box::pin(async move {
                    token_response(tokens.acquire_token(false).await)
                }))
            }
            RelayRequest::SendQuery { query } => {
                let tokens = self.tokens.clone();
                let backend = self.backend.clone();
                Dispatch::Deferred(Box::pin(async move {
                    match tokens.acquire_token(true).await {
                        Ok(token) => backend.query(&query, &token).await.into(),
                        Err(e) => RelayResponse::failure(e.to_string()),
                    }
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityService, StaticIdentity};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Denied;

    #[async_trait]
    impl IdentityService for Denied {
        fn name(&self) -> &str {
            "denied"
        }

        async fn get_auth_token(&self, _interactive: bool) -> Result<String, String> {
            Err("OAuth2 not granted or revoked.".to_string())
        }
    }

    fn relay_with(service: Arc<dyn IdentityService>) -> Relay {
        // Port 9 (discard) on loopback: nothing listens, so queries fail fast.
        let backend = BackendClient::new(
            Some("http://127.0.0.1:9".into()),
            Some("http://127.0.0.1:9/query".into()),
            Some(std::time::Duration::from_secs(2)),
        );
        Relay::new(TokenProvider::new(service), backend)
    }

    #[test]
    fn ping_is_immediate() {
        let relay = relay_with(Arc::new(Denied));
        match relay.dispatch(RelayRequest::Ping) {
            Dispatch::Immediate(res) => {
                assert!(res.success);
                assert_eq!(res.message.as_deref(), Some("alive"));
            }
            Dispatch::Deferred(_) => panic!("ping must not defer"),
        }
    }

    #[test]
    fn async_kinds_defer() {
        let relay = relay_with(Arc::new(Denied));
        assert!(!relay.dispatch(RelayRequest::StartOAuth).is_immediate());
        assert!(!relay.dispatch(RelayRequest::CheckAuth).is_immediate());
        assert!(!relay
            .dispatch(RelayRequest::SendQuery { query: "q".into() })
            .is_immediate());
    }

    #[tokio::test]
    async fn start_oauth_success_returns_token() {
        let relay = relay_with(Arc::new(StaticIdentity::new("ya29.token")));
        let res = relay.dispatch(RelayRequest::StartOAuth).resolve().await;
        assert!(res.success);
        assert_eq!(res.token.as_deref(), Some("ya29.token"));
    }

    #[tokio::test]
    async fn start_oauth_failure_has_error() {
        let relay = relay_with(Arc::new(Denied));
        let res = relay.dispatch(RelayRequest::StartOAuth).resolve().await;
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("OAuth2 not granted or revoked."));
        assert!(res.token.is_none());
    }

    #[tokio::test]
    async fn send_query_token_failure_skips_backend() {
        let relay = relay_with(Arc::new(Denied));
        let res = relay
            .dispatch(RelayRequest::SendQuery { query: "q".into() })
            .resolve()
            .await;
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("OAuth2 not granted or revoked."));
    }

    #[tokio::test]
    async fn send_query_unreachable_backend_is_failure() {
        let relay = relay_with(Arc::new(StaticIdentity::new("t")));
        let res = relay
            .dispatch(RelayRequest::SendQuery { query: "q".into() })
            .resolve()
            .await;
        assert!(!res.success);
        assert!(!res.error.unwrap_or_default().is_empty());
    }
}
