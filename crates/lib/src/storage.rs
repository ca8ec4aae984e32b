//! Local storage: a string key/value file that survives restarts (the app's localStorage).
//!
//! Two keys are used: `courseToken` holds the raw Canvas token and `courses` holds the
//! JSON-serialized course list. Both are written together when courses are loaded.

use crate::api::Course;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const COURSE_TOKEN_KEY: &str = "courseToken";
pub const COURSES_KEY: &str = "courses";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing storage: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Courses plus the Canvas token they were fetched with. Persisted and restored as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSet {
    pub courses: Vec<Course>,
    pub course_token: String,
}

/// File-backed string map. Missing or unreadable file loads as empty.
pub struct LocalStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl LocalStorage {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                log::warn!("storage file {} is not valid JSON, starting empty: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value.into());
        self.commit(next)
    }

    pub fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut next = self.entries.clone();
        next.remove(key);
        self.commit(next)
    }

    /// Write `next` to disk, then adopt it. On error memory keeps matching the file.
    fn commit(&mut self, next: BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(&next)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.path, json).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.entries = next;
        Ok(())
    }

    /// Persist the course token and course list.
    pub fn save_course_set(&mut self, set: &CourseSet) -> Result<(), StorageError> {
        let courses = serde_json::to_string(&set.courses)?;
        let mut next = self.entries.clone();
        next.insert(COURSE_TOKEN_KEY.to_string(), set.course_token.clone());
        next.insert(COURSES_KEY.to_string(), courses);
        self.commit(next)
    }

    /// Restore a previously saved course set. None unless both keys are present and valid.
    pub fn load_course_set(&self) -> Option<CourseSet> {
        let token = self.get_item(COURSE_TOKEN_KEY)?.trim();
        if token.is_empty() {
            return None;
        }
        let raw = self.get_item(COURSES_KEY)?;
        let courses: Vec<Course> = match serde_json::from_str(raw) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("stored courses are not valid, ignoring: {}", e);
                return None;
            }
        };
        Some(CourseSet {
            courses,
            course_token: token.to_string(),
        })
    }

    pub fn clear_course_set(&mut self) -> Result<(), StorageError> {
        let mut next = self.entries.clone();
        next.remove(COURSE_TOKEN_KEY);
        next.remove(COURSES_KEY);
        self.commit(next)
    }
}
