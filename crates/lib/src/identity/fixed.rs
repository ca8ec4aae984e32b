//! Identity services that need no external program.

use super::IdentityService;
use async_trait::async_trait;

/// Always returns the same token (from config or GOOGLE_OAUTH_TOKEN).
pub struct StaticIdentity {
    token: String,
}

impl StaticIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl IdentityService for StaticIdentity {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_auth_token(&self, _interactive: bool) -> Result<String, String> {
        Ok(self.token.clone())
    }
}

/// Used when nothing is configured; every call fails with a hint.
pub struct UnconfiguredIdentity;

#[async_trait]
impl IdentityService for UnconfiguredIdentity {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn get_auth_token(&self, _interactive: bool) -> Result<String, String> {
        Err("no identity provider configured (set identity.tokenCommand, identity.token or GOOGLE_OAUTH_TOKEN)".to_string())
    }
}
