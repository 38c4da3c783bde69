//! Error types for AutoTest

use thiserror::Error;

/// Result type alias using AutoTest Error
pub type Result<T> = std::result::Result<T, Error>;

/// AutoTest error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Resource already exists: {kind} with id {id}")]
    AlreadyExists { kind: String, id: String },

    #[error("Group {0} cannot be removed")]
    GroupLocked(usize),

    #[error("A test run is already in progress: {0}")]
    Busy(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Runner error: {0}")]
    Runner(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    pub fn already_exists(kind: impl Into<String>, id: impl ToString) -> Self {
        Error::AlreadyExists {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}
