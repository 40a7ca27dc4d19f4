//! Error types for the course manager core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while managing courses.
#[derive(Error, Debug)]
pub enum CourseError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("No such entry: {0}")]
    EntryNotFound(PathBuf),

    #[error("No course tree on this side (server role holds assignment data only)")]
    NoCourseTree,

    #[error("Course format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Result type for course operations.
pub type CourseResult<T> = Result<T, CourseError>;
