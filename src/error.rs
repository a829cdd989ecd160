//! Error types shared by the extraction, sync and publish paths.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Non-fatal: the entry or operation is skipped
    NotFound,
    MalformedLine,
    InvalidTaskId,

    // Fatal to a batch or an operation
    ResolutionExhausted,
    Transport,
    InvalidChangeLog,
    InvalidConfig,
    InvalidRequest,
    Unauthorized,

    // Internal errors
    Io,
    InternalError,
}

/// Library error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("line {line} of {path} is not a task")]
    MalformedLine { path: String, line: usize },

    #[error("invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("no intake document for new tasks: {0}")]
    ResolutionExhausted(String),

    #[error("publish failed: {0}")]
    Transport(String),

    #[error("change log {path} is malformed: {source}")]
    InvalidChangeLog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("missing or wrong page secret")]
    Unauthorized,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::MalformedLine { .. } => ErrorCode::MalformedLine,
            Error::InvalidTaskId(_) => ErrorCode::InvalidTaskId,
            Error::ResolutionExhausted(_) => ErrorCode::ResolutionExhausted,
            Error::Transport(_) => ErrorCode::Transport,
            Error::InvalidChangeLog { .. } => ErrorCode::InvalidChangeLog,
            Error::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Error::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Error::Unauthorized => ErrorCode::Unauthorized,
            Error::Io { .. } => ErrorCode::Io,
            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the error only affects the single entry being processed.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::NotFound | ErrorCode::MalformedLine | ErrorCode::InvalidTaskId
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, Error>;
