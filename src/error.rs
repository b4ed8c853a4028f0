//! Error types for the StickySync engine
//!
//! All errors use thiserror for structured error handling.
//! Network and storage failures stay distinguishable so callers can
//! apply the right retry policy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Invalid snooze duration: {0} minutes")]
    InvalidSnooze(i64),

    #[error("Session not ready: {0}")]
    SessionNotReady(String),

    #[error("{0}")]
    Generic(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
