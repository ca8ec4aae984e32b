//! Token provider: Google OAuth bearer tokens from a pluggable identity service.
//!
//! The relay never talks to a concrete identity backend; it holds an `Arc<dyn IdentityService>`
//! chosen from config at startup (or a test double).

mod command;
mod fixed;

pub use command::CommandIdentity;
pub use fixed::{StaticIdentity, UnconfiguredIdentity};

use crate::config::{self, Config};
use async_trait::async_trait;
use std::sync::Arc;

/// Platform identity service (the role `chrome.identity` plays in a browser).
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Short name for logs (e.g. "command", "static").
    fn name(&self) -> &str;

    /// Return an access token. When `interactive` is false the service must not prompt the user
    /// and should only return a token it already holds. Errors carry the platform's message.
    async fn get_auth_token(&self, interactive: bool) -> Result<String, String>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Platform(String),
    #[error("identity service returned an empty token")]
    EmptyToken,
}

/// Single-attempt token acquisition over an injected identity service.
#[derive(Clone)]
pub struct TokenProvider {
    service: Arc<dyn IdentityService>,
}

impl TokenProvider {
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self { service }
    }

    /// Ask the identity service for a token once. No retries; callers decide whether to call again.
    pub async fn acquire_token(&self, interactive: bool) -> Result<String, AuthError> {
        match self.service.get_auth_token(interactive).await {
            Ok(token) => {
                let token = token.trim().to_string();
                if token.is_empty() {
                    log::warn!("identity {}: empty token", self.service.name());
                    return Err(AuthError::EmptyToken);
                }
                log::debug!(
                    "identity {}: token acquired (interactive={})",
                    self.service.name(),
                    interactive
                );
                Ok(token)
            }
            Err(e) => {
                let msg = if e.trim().is_empty() {
                    "identity service failed without a message".to_string()
                } else {
                    e
                };
                log::info!("identity {}: {}", self.service.name(), msg);
                Err(AuthError::Platform(msg))
            }
        }
    }
}

/// Pick the identity service from config: fixed token (GOOGLE_OAUTH_TOKEN or identity.token), then
/// identity.tokenCommand, else a service that always reports the missing configuration.
pub fn identity_from_config(config: &Config) -> Arc<dyn IdentityService> {
    if let Some(token) = config::resolve_google_token(config) {
        log::info!("identity: using static token");
        return Arc::new(StaticIdentity::new(token));
    }
    if !config.identity.token_command.is_empty() {
        log::info!("identity: using token command {}", config.identity.token_command[0]);
        return Arc::new(CommandIdentity::new(
            config.identity.token_command.clone(),
            config.identity.client_id.clone(),
            config.identity.scopes.clone(),
        ));
    }
    log::warn!("identity: no token source configured");
    Arc::new(UnconfiguredIdentity)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Result<String, String>);

    #[async_trait]
    impl IdentityService for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn get_auth_token(&self, _interactive: bool) -> Result<String, String> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn platform_error_keeps_message() {
        let p = TokenProvider::new(Arc::new(Scripted(Err("The user did not approve access.".into()))));
        let err = p.acquire_token(true).await.unwrap_err();
        assert_eq!(err.to_string(), "The user did not approve access.");
    }

    #[tokio::test]
    async fn blank_platform_error_still_has_message() {
        let p = TokenProvider::new(Arc::new(Scripted(Err("  ".into()))));
        let err = p.acquire_token(true).await.unwrap_err();
        assert!(!err.to_string().trim().is_empty());
    }

    #[tokio::test]
    async fn token_is_trimmed_and_empty_rejected() {
        let p = TokenProvider::new(Arc::new(Scripted(Ok(" ya29.abc\n".into()))));
        assert_eq!(p.acquire_token(false).await.unwrap(), "ya29.abc");
        let p = TokenProvider::new(Arc::new(Scripted(Ok("\n".into()))));
        assert!(matches!(p.acquire_token(false).await, Err(AuthError::EmptyToken)));
    }

    #[test]
    fn unconfigured_by_default() {
        if std::env::var("GOOGLE_OAUTH_TOKEN").is_ok() {
            return;
        }
        assert_eq!(identity_from_config(&Config::default()).name(), "unconfigured");
    }

    #[test]
    fn command_selected_when_configured() {
        if std::env::var("GOOGLE_OAUTH_TOKEN").is_ok() {
            return;
        }
        let mut config = Config::default();
        config.identity.token_command = vec!["echo".into(), "t".into()];
        assert_eq!(identity_from_config(&config).name(), "command");
    }
}
