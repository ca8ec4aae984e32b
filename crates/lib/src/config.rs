//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.canvasqa/config.json`) and environment.
//! Every section has defaults so an empty `{}` (or a missing file) is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Relay (background process) settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Backend endpoints and Canvas token.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Identity provider (Google OAuth token source).
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Desktop UI options.
    #[serde(default)]
    pub ui: UiConfig,
}

/// Relay bind, port, and auth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Port for HTTP and WebSocket (default 15152).
    #[serde(default = "default_relay_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_relay_bind")]
    pub bind: String,

    /// Auth settings. When absent, defaults to no auth for loopback bind.
    #[serde(default)]
    pub auth: RelayAuthConfig,
}

/// Relay auth: token or none (loopback-only when none).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayAuthConfig {
    /// "none" = no shared secret (only safe when bind is loopback). "token" = require `?token=` on /ws and /message.
    #[serde(default)]
    pub mode: RelayAuthMode,

    /// Shared secret. Overridden by CANVASQA_RELAY_TOKEN env.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayAuthMode {
    /// No auth; allow only when bind is loopback.
    #[default]
    None,

    /// Require the configured token on every request.
    Token,
}

fn default_relay_port() -> u16 {
    15152
}

fn default_relay_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_relay_port(),
            bind: default_relay_bind(),
            auth: RelayAuthConfig::default(),
        }
    }
}

impl RelayConfig {
    /// WebSocket URL clients use to reach this relay. IPv6 binds are bracketed and the token,
    /// when given, is form-encoded into `?token=`.
    pub fn ws_url(&self, token: Option<&str>) -> String {
        let base = format!("ws://{}:{}/ws", url_host(&self.bind), self.port);
        let mut url = match reqwest::Url::parse(&base) {
            Ok(u) => u,
            Err(e) => {
                log::warn!("relay bind {:?} does not form a valid URL: {}", self.bind, e);
                return base;
            }
        };
        if let Some(t) = token {
            url.query_pairs_mut().append_pair("token", t);
        }
        url.to_string()
    }

    /// Resolved socket addresses for the relay's bind and port (`localhost` and IPv6 included).
    pub fn socket_addrs(&self) -> Vec<std::net::SocketAddr> {
        use std::net::ToSocketAddrs;
        match (self.bind.trim(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                log::debug!("resolving relay bind {:?}: {}", self.bind, e);
                Vec::new()
            }
        }
    }
}

/// Host part of a URL for a bind address: IPv6 literals need brackets.
fn url_host(bind: &str) -> String {
    let b = bind.trim();
    if b.parse::<std::net::Ipv6Addr>().is_ok() {
        format!("[{}]", b)
    } else {
        b.to_string()
    }
}

/// Backend endpoints. The backend itself lives outside this repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL serving /api/courses, /api/ask and /api/health. Overridden by CANVASQA_BACKEND_URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Full URL of the query endpoint used by the relay's sendQuery.
    #[serde(default = "default_query_url")]
    pub query_url: String,

    /// Per-request timeout in seconds (default 60).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Canvas access token. Overridden by CANVAS_ACCESS_TOKEN env. The UI normally takes it from the user instead.
    pub canvas_token: Option<String>,
}

fn default_api_base_url() -> String {
    "http://localhost:5001".to_string()
}

fn default_query_url() -> String {
    "http://localhost:5000/query".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            query_url: default_query_url(),
            request_timeout_secs: default_request_timeout_secs(),
            canvas_token: None,
        }
    }
}

/// Where the relay gets Google OAuth tokens from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConfig {
    /// OAuth client id, passed to the token command as CANVASQA_CLIENT_ID.
    pub client_id: Option<String>,
    /// OAuth scopes, passed to the token command as CANVASQA_SCOPES (space-separated).
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Fixed bearer token. Overridden by GOOGLE_OAUTH_TOKEN env.
    pub token: Option<String>,
    /// Command (program followed by arguments, no shell) that prints an access token on stdout,
    /// e.g. `["gcloud", "auth", "print-access-token"]`. Runs on interactive sign-in.
    #[serde(default)]
    pub token_command: Vec<String>,
}

/// Desktop UI options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    /// Delay between revealed characters on the result screen (default 1 ms).
    #[serde(default = "default_reveal_interval_ms")]
    pub reveal_interval_ms: u64,
    /// Local storage file (course token and courses). Defaults to `storage.json` next to the config file.
    pub storage_path: Option<PathBuf>,
}

fn default_reveal_interval_ms() -> u64 {
    1
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            reveal_interval_ms: default_reveal_interval_ms(),
            storage_path: None,
        }
    }
}

/// Non-empty trimmed value of an env var, if set.
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the relay token: env CANVASQA_RELAY_TOKEN overrides config.
pub fn resolve_relay_token(config: &Config) -> Option<String> {
    env_non_empty("CANVASQA_RELAY_TOKEN").or_else(|| trimmed(config.relay.auth.token.as_ref()))
}

/// Resolve the backend base URL: env CANVASQA_BACKEND_URL overrides config. Trailing slashes are removed.
pub fn resolve_api_base_url(config: &Config) -> String {
    env_non_empty("CANVASQA_BACKEND_URL")
        .unwrap_or_else(|| config.backend.api_base_url.clone())
        .trim_end_matches('/')
        .to_string()
}

/// Resolve the Canvas token: env CANVAS_ACCESS_TOKEN overrides config.
pub fn resolve_canvas_token(config: &Config) -> Option<String> {
    env_non_empty("CANVAS_ACCESS_TOKEN").or_else(|| trimmed(config.backend.canvas_token.as_ref()))
}

/// Resolve a fixed Google token: env GOOGLE_OAUTH_TOKEN overrides config.
pub fn resolve_google_token(config: &Config) -> Option<String> {
    env_non_empty("GOOGLE_OAUTH_TOKEN").or_else(|| trimmed(config.identity.token.as_ref()))
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("CANVASQA_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".canvasqa").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Resolve the local storage file: `ui.storagePath` if set (relative paths resolved against the
/// config file's parent), otherwise `storage.json` next to the config file.
pub fn resolve_storage_path(config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.ui.storage_path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                config_parent.join(p)
            }
        }
        _ => config_parent.join("storage.json"),
    }
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
