//! Backend wire types: courses, ask/query bodies, and the uniform result shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Placeholder name for course records the backend sent without one.
pub const UNKNOWN_COURSE_NAME: &str = "Unknown Course";

/// A Canvas course as returned by `POST /api/courses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub course_code: String,
}

/// Raw course record; every field optional so one bad record does not fail the whole list.
/// Canvas ids arrive as numbers, so `id` is kept as a JSON value.
#[derive(Debug, Deserialize)]
struct CourseRecord {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    course_code: Option<String>,
}

/// Result of decoding a `{courses: [...]}` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseDecode {
    pub courses: Vec<Course>,
    /// Indices (in the backend list) of records rejected because they carried no usable id.
    pub rejected: Vec<usize>,
}

fn id_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode the courses list. Returns None when the body has no `courses` array.
/// Records without an id are rejected; a missing name or course code falls back to a placeholder.
pub fn decode_courses(body: &Value) -> Option<CourseDecode> {
    let list = body.get("courses")?.as_array()?;
    let mut out = CourseDecode::default();
    for (index, raw) in list.iter().enumerate() {
        let record: CourseRecord = match serde_json::from_value(raw.clone()) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("course record {} is not an object: {}", index, e);
                out.rejected.push(index);
                continue;
            }
        };
        let Some(id) = record.id.as_ref().and_then(id_string) else {
            log::warn!("course record {} has no id, skipping", index);
            out.rejected.push(index);
            continue;
        };
        let name = match record.name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => n,
            _ => {
                log::warn!("course {} has no name, using placeholder", id);
                UNKNOWN_COURSE_NAME.to_string()
            }
        };
        let course_code = record.course_code.unwrap_or_else(|| {
            log::debug!("course {} has no course_code", id);
            String::new()
        });
        out.courses.push(Course {
            id,
            name,
            course_code,
        });
    }
    Some(out)
}

/// One question for `POST /api/ask`, built per submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub question: String,
    /// Name of the selected course, sent as the ask context.
    pub selected_course: String,
    pub course_token: String,
    pub bearer_token: String,
}

impl QueryRequest {
    /// Body for `POST /api/ask`.
    pub fn to_ask_body(&self) -> Value {
        json!({
            "question": self.question,
            "context": { "courses": [self.selected_course] },
            "canvas_tokens": { "access_token": self.course_token },
            "google_tokens": { "access_token": self.bearer_token },
        })
    }
}

/// Body for `POST /api/courses`.
pub fn courses_body(canvas_token: &str) -> Value {
    json!({ "canvas_tokens": { "access_token": canvas_token } })
}

/// Body for the relay's query endpoint. `timestamp` is RFC 3339 UTC with milliseconds.
pub fn query_body(query: &str, google_token: &str) -> Value {
    json!({
        "query": query,
        "google_token": google_token,
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

/// Uniform result of a backend call: `{success: true, data}` or `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_numeric_and_string_ids() {
        let body = json!({"courses": [
            {"id": 101, "name": "Intro CS", "course_code": "CS101"},
            {"id": "202", "name": "Linear Algebra", "course_code": "MATH220"}
        ]});
        let d = decode_courses(&body).unwrap();
        assert!(d.rejected.is_empty());
        assert_eq!(d.courses[0].id, "101");
        assert_eq!(d.courses[1].course_code, "MATH220");
    }

    #[test]
    fn decode_reports_records_without_id_and_fills_names() {
        let body = json!({"courses": [
            {"name": "No id"},
            {"id": 7},
            "garbage"
        ]});
        let d = decode_courses(&body).unwrap();
        assert_eq!(d.rejected, vec![0, 2]);
        assert_eq!(
            d.courses,
            vec![Course {
                id: "7".into(),
                name: UNKNOWN_COURSE_NAME.into(),
                course_code: String::new(),
            }]
        );
    }

    #[test]
    fn decode_without_courses_array_is_none() {
        assert!(decode_courses(&json!({"error": "missing_canvas_token"})).is_none());
        assert!(decode_courses(&json!({"courses": {}})).is_none());
    }

    #[test]
    fn ask_body_shape() {
        let req = QueryRequest {
            question: "When is the midterm?".into(),
            selected_course: "Intro CS".into(),
            course_token: "canvas-tok".into(),
            bearer_token: "google-tok".into(),
        };
        assert_eq!(
            req.to_ask_body(),
            json!({
                "question": "When is the midterm?",
                "context": {"courses": ["Intro CS"]},
                "canvas_tokens": {"access_token": "canvas-tok"},
                "google_tokens": {"access_token": "google-tok"},
            })
        );
    }

    #[test]
    fn query_body_has_timestamp() {
        let b = query_body("q", "g");
        assert_eq!(b["query"], "q");
        assert_eq!(b["google_token"], "g");
        assert!(b["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn api_result_wire_shape() {
        assert_eq!(
            serde_json::to_value(ApiResult::err("boom")).unwrap(),
            json!({"success": false, "error": "boom"})
        );
        assert_eq!(
            serde_json::to_value(ApiResult::ok(json!({"a": 1}))).unwrap(),
            json!({"success": true, "data": {"a": 1}})
        );
    }
}
