//! Relay message types: `{id?, action, query?}` requests and `{id?, success, ...}` responses.

use crate::api::ApiResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;

pub const SHUTDOWN_EVENT_JSON: &str = r#"{"type":"event","event":"shutdown","payload":{}}"#;

/// A request from a UI surface. The wire tag is `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum RelayRequest {
    /// Interactive sign-in; responds with the bearer token.
    #[serde(rename = "startOAuth")]
    StartOAuth,
    /// Non-interactive token lookup (no prompt); used at UI startup.
    #[serde(rename = "checkAuth")]
    CheckAuth,
    /// Forward a query to the query endpoint with the user's token.
    #[serde(rename = "sendQuery")]
    SendQuery {
        #[serde(default)]
        query: String,
    },
    /// Liveness probe; answered immediately.
    #[serde(rename = "ping")]
    Ping,
}

impl RelayRequest {
    pub fn action(&self) -> &'static str {
        match self {
            RelayRequest::StartOAuth => "startOAuth",
            RelayRequest::CheckAuth => "checkAuth",
            RelayRequest::SendQuery { .. } => "sendQuery",
            RelayRequest::Ping => "ping",
        }
    }

    /// Wire frame for this request with a correlation id.
    pub fn to_frame(&self, id: &str) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(obj) = v.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.to_string()));
        }
        v
    }
}

/// Response to exactly one request. Only the fields relevant to the action are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResponse {
    fn empty(success: bool) -> Self {
        Self {
            id: None,
            success,
            token: None,
            data: None,
            message: None,
            error: None,
        }
    }

    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::empty(true)
        }
    }

    pub fn alive() -> Self {
        Self {
            message: Some("alive".to_string()),
            ..Self::empty(true)
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            "unknown error".to_string()
        } else {
            error
        };
        Self {
            error: Some(error),
            ..Self::empty(false)
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":"response serialization failed"}"#.to_string()
        })
    }
}

impl From<ApiResult> for RelayResponse {
    fn from(result: ApiResult) -> Self {
        if result.success {
            Self {
                data: result.data,
                ..Self::empty(true)
            }
        } else {
            Self::failure(result.error.unwrap_or_default())
        }
    }
}

/// A frame that could not be turned into a request; `id` is kept when it was readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameError {
    pub id: Option<String>,
    pub error: String,
}

/// Parse an inbound frame into its optional correlation id and request.
pub fn parse_frame(text: &str) -> Result<(Option<String>, RelayRequest), FrameError> {
    let value: Value = serde_json::from_str(text).map_err(|e| FrameError {
        id: None,
        error: format!("invalid JSON: {}", e),
    })?;
    let id = value.get("id").and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let action = value.get("action").and_then(|a| a.as_str()).map(String::from);
    match serde_json::from_value::<RelayRequest>(value) {
        Ok(req) => Ok((id, req)),
        Err(e) => {
            let error = match action {
                Some(a) if !matches!(a.as_str(), "startOAuth" | "checkAuth" | "sendQuery" | "ping") => {
                    format!("unknown action: {}", a)
                }
                None => "missing action".to_string(),
                Some(_) => format!("invalid request: {}", e),
            };
            Err(FrameError { id, error })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_actions() {
        assert_eq!(parse_frame(r#"{"action":"ping"}"#).unwrap(), (None, RelayRequest::Ping));
        assert_eq!(
            parse_frame(r#"{"id":"7","action":"startOAuth"}"#).unwrap(),
            (Some("7".into()), RelayRequest::StartOAuth)
        );
        assert_eq!(
            parse_frame(r#"{"id":8,"action":"sendQuery","query":"hw due?"}"#).unwrap(),
            (
                Some("8".into()),
                RelayRequest::SendQuery {
                    query: "hw due?".into()
                }
            )
        );
        assert_eq!(parse_frame(r#"{"action":"checkAuth"}"#).unwrap().1, RelayRequest::CheckAuth);
    }

    #[test]
    fn frame_errors_keep_id() {
        let e = parse_frame(r#"{"id":"3","action":"selfDestruct"}"#).unwrap_err();
        assert_eq!(e.id.as_deref(), Some("3"));
        assert_eq!(e.error, "unknown action: selfDestruct");
        let e = parse_frame(r#"{"id":"4"}"#).unwrap_err();
        assert_eq!(e.error, "missing action");
        let e = parse_frame("not json").unwrap_err();
        assert!(e.id.is_none());
        assert!(e.error.starts_with("invalid JSON"));
    }

    #[test]
    fn request_frame_round_trips() {
        let req = RelayRequest::SendQuery { query: "q".into() };
        let frame = req.to_frame("12");
        assert_eq!(frame, json!({"action":"sendQuery","query":"q","id":"12"}));
        assert_eq!(parse_frame(&frame.to_string()).unwrap(), (Some("12".into()), req));
    }

    #[test]
    fn response_shapes() {
        assert_eq!(
            serde_json::to_value(RelayResponse::alive()).unwrap(),
            json!({"success": true, "message": "alive"})
        );
        assert_eq!(
            serde_json::to_value(RelayResponse::token("t").with_id(Some("1".into()))).unwrap(),
            json!({"id": "1", "success": true, "token": "t"})
        );
        assert_eq!(RelayResponse::failure("").error.as_deref(), Some("unknown error"));
    }

    #[test]
    fn api_result_forwarded_verbatim() {
        let r: RelayResponse = ApiResult::ok(json!({"answer": 42})).into();
        assert!(r.success);
        assert_eq!(r.data, Some(json!({"answer": 42})));
        let r: RelayResponse = ApiResult::err("backend returned HTTP 500").into();
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("backend returned HTTP 500"));
    }
}
