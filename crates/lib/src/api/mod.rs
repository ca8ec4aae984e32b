//! API gateway client for the course Q&A backend.
//!
//! JSON over HTTP: `POST /api/courses`, `POST /api/ask`, `POST /query`, `GET /api/health`.
//! The backend (Canvas scraping, retrieval, generation) is a separate service.

mod client;
mod types;

pub use client::{ApiError, BackendClient};
pub use types::{
    courses_body, decode_courses, query_body, ApiResult, Course, CourseDecode, QueryRequest,
    UNKNOWN_COURSE_NAME,
};
