//! Screen components: Canvas token entry and question submission.
//!
//! Each component keeps its own input and loading state. The `begin`/`prepare` and `finish`
//! halves let a frame-polled UI run the backend call on a worker; `submit` does both in one await.

use super::shell::Session;
use crate::api::{ApiError, BackendClient, Course, QueryRequest};
use crate::storage::CourseSet;
use async_trait::async_trait;

/// Backend calls the screens make directly (not through the relay).
#[async_trait]
pub trait CourseBackend: Send + Sync {
    async fn fetch_courses(&self, canvas_token: &str) -> Result<Vec<Course>, ApiError>;
    async fn ask(&self, request: &QueryRequest) -> Result<String, ApiError>;
}

#[async_trait]
impl CourseBackend for BackendClient {
    async fn fetch_courses(&self, canvas_token: &str) -> Result<Vec<Course>, ApiError> {
        BackendClient::fetch_courses(self, canvas_token).await
    }

    async fn ask(&self, request: &QueryRequest) -> Result<String, ApiError> {
        BackendClient::ask(self, request).await
    }
}

/// User-facing input problems. Display strings are shown as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please select a course")]
    NoCourseSelected,
    #[error("Please enter a question")]
    EmptyQuestion,
    #[error("Please paste your Canvas access token")]
    EmptyToken,
    #[error("Please sign in first")]
    NotSignedIn,
    #[error("A request is already in progress")]
    Busy,
}

/// Canvas token paste screen.
#[derive(Debug, Default)]
pub struct CourseTokenEntry {
    pub token_input: String,
    loading: bool,
    error: Option<String>,
}

impl CourseTokenEntry {
    pub fn can_submit(&self) -> bool {
        !self.loading && !self.token_input.trim().is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validate and mark loading. Returns the trimmed token to fetch courses with.
    pub fn begin(&mut self) -> Result<String, ValidationError> {
        if self.loading {
            return Err(ValidationError::Busy);
        }
        let token = self.token_input.trim().to_string();
        if token.is_empty() {
            return Err(ValidationError::EmptyToken);
        }
        self.loading = true;
        self.error = None;
        Ok(token)
    }

    /// Settle a fetch started by `begin`. An empty course list counts as a failure.
    pub fn finish(&mut self, token: String, result: Result<Vec<Course>, ApiError>) -> Option<CourseSet> {
        self.loading = false;
        match result {
            Ok(courses) if courses.is_empty() => {
                log::warn!("no courses returned for the pasted Canvas token");
                self.error = Some("No courses found for this Canvas token".to_string());
                None
            }
            Ok(courses) => Some(CourseSet {
                courses,
                course_token: token,
            }),
            Err(e) => {
                log::error!("fetching courses failed: {}", e);
                self.error = Some(e.to_string());
                None
            }
        }
    }

    pub async fn submit(&mut self, backend: &dyn CourseBackend) -> Result<Option<CourseSet>, ValidationError> {
        let token = self.begin()?;
        let result = backend.fetch_courses(&token).await;
        Ok(self.finish(token, result))
    }
}

/// Question screen: one selected course and a question.
#[derive(Debug, Default)]
pub struct QuerySubmission {
    pub question: String,
    /// Name of the selected course.
    pub selected_course: Option<String>,
    in_flight: bool,
    error: Option<String>,
}

impl QuerySubmission {
    pub fn can_submit(&self) -> bool {
        !self.in_flight && !self.question.trim().is_empty()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validate against the session and loaded courses and build the request. On success the
    /// question box is cleared and the submission is marked in flight.
    pub fn prepare(&mut self, session: &Session, set: &CourseSet) -> Result<QueryRequest, ValidationError> {
        if self.in_flight {
            return Err(ValidationError::Busy);
        }
        let course = self
            .selected_course
            .as_deref()
            .map(str::trim)
            .filter(|name| set.courses.iter().any(|c| c.name == *name))
            .ok_or(ValidationError::NoCourseSelected)?
            .to_string();
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        let bearer_token = session
            .bearer_token
            .clone()
            .filter(|_| session.authenticated())
            .ok_or(ValidationError::NotSignedIn)?;
        self.question.clear();
        self.in_flight = true;
        self.error = None;
        Ok(QueryRequest {
            question,
            selected_course: course,
            course_token: set.course_token.clone(),
            bearer_token,
        })
    }

    /// Settle a request started by `prepare`. Returns the answer; failures are kept for display.
    pub fn finish(&mut self, result: Result<String, ApiError>) -> Option<String> {
        self.in_flight = false;
        match result {
            Ok(message) => Some(message),
            Err(e) => {
                log::error!("asking the backend failed: {}", e);
                self.error = Some(e.to_string());
                None
            }
        }
    }

    pub async fn submit(
        &mut self,
        backend: &dyn CourseBackend,
        session: &Session,
        set: &CourseSet,
    ) -> Result<Option<String>, ValidationError> {
        let request = self.prepare(session, set)?;
        let result = backend.ask(&request).await;
        Ok(self.finish(result))
    }
}
