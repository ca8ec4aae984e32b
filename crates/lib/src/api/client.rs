//! Backend HTTP client (http://localhost:5001 and http://localhost:5000/query by default).
//! Every call has a bounded timeout; `send` never fails, it folds errors into `ApiResult`.

use super::types::{
    courses_body, decode_courses, query_body, ApiResult, Course, QueryRequest,
};
use crate::config::{self, Config};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "http://localhost:5001";
const DEFAULT_QUERY_URL: &str = "http://localhost:5000/query";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Longest slice of a non-JSON error body kept in an error message.
const ERROR_BODY_MAX_CHARS: usize = 200;

/// Client for the course Q&A backend.
#[derive(Clone)]
pub struct BackendClient {
    api_base_url: String,
    query_url: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend returned HTTP {status}{detail}")]
    Status { status: u16, detail: String },
    #[error("invalid backend response: {0}")]
    Decode(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl ApiError {
    /// Build a status error, pulling `message` or `error` out of a JSON error body when present.
    fn status(status: u16, body: &str) -> Self {
        let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
            ["message", "error", "details"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(String::from))
        });
        let text = from_json.unwrap_or_else(|| body.trim().chars().take(ERROR_BODY_MAX_CHARS).collect());
        let detail = if text.is_empty() {
            String::new()
        } else {
            format!(": {}", text)
        };
        ApiError::Status { status, detail }
    }
}

impl BackendClient {
    pub fn new(api_base_url: Option<String>, query_url: Option<String>, timeout: Option<Duration>) -> Self {
        let api_base_url = api_base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let query_url = query_url.unwrap_or_else(|| DEFAULT_QUERY_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("building backend http client failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            api_base_url,
            query_url,
            client,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Some(config::resolve_api_base_url(config)),
            Some(config.backend.query_url.clone()),
            Some(Duration::from_secs(config.backend.request_timeout_secs.max(1))),
        )
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Absolute URLs are used as-is; anything else is a path under the API base URL.
    fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.api_base_url, endpoint.trim_start_matches('/'))
        }
    }

    async fn post_json(&self, url: &str, body: &Value, bearer: Option<&str>) -> Result<Value, ApiError> {
        let mut req = self.client.post(url).json(body);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(ApiError::status(status.as_u16(), &text));
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// POST `payload` as JSON to `endpoint` (a path under the API base URL or an absolute URL),
    /// optionally with a bearer token. All failures become `{success: false, error}`.
    pub async fn send(&self, endpoint: &str, payload: &Value, bearer: Option<&str>) -> ApiResult {
        let url = self.endpoint_url(endpoint);
        match self.post_json(&url, payload, bearer).await {
            Ok(data) => ApiResult::ok(data),
            Err(e) => {
                log::warn!("POST {} failed: {}", url, e);
                ApiResult::err(e.to_string())
            }
        }
    }

    /// POST /api/courses - list the user's Canvas courses.
    pub async fn fetch_courses(&self, canvas_token: &str) -> Result<Vec<Course>, ApiError> {
        let url = self.endpoint_url("/api/courses");
        let body = self.post_json(&url, &courses_body(canvas_token), None).await?;
        let decoded = decode_courses(&body)
            .ok_or_else(|| ApiError::Decode("response has no courses list".to_string()))?;
        if !decoded.rejected.is_empty() {
            log::warn!(
                "dropped {} malformed course record(s) from backend",
                decoded.rejected.len()
            );
        }
        log::info!("fetched {} course(s)", decoded.courses.len());
        Ok(decoded.courses)
    }

    /// POST /api/ask - answer a question about the selected course; returns the `message` text.
    pub async fn ask(&self, request: &QueryRequest) -> Result<String, ApiError> {
        let url = self.endpoint_url("/api/ask");
        let body = self.post_json(&url, &request.to_ask_body(), None).await?;
        match body.get("message").and_then(|m| m.as_str()) {
            Some(message) => Ok(message.to_string()),
            None => {
                let reason = body
                    .get("error")
                    .and_then(|e| e.as_str())
                    .unwrap_or("response has no message");
                Err(ApiError::Backend(reason.to_string()))
            }
        }
    }

    /// POST the query endpoint with `{query, google_token, timestamp}`.
    pub async fn query(&self, query: &str, google_token: &str) -> ApiResult {
        let url = self.query_url.clone();
        self.send(&url, &query_body(query, google_token), None).await
    }

    /// GET /api/health - true when the backend answers `{ok: true}`.
    pub async fn health(&self) -> Result<bool, ApiError> {
        let url = self.endpoint_url("/api/health");
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::status(status, &body));
        }
        let data: Value = res.json().await?;
        Ok(data.get("ok").and_then(|v| v.as_bool()).unwrap_or(false))
    }
}
