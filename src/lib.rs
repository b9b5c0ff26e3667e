//! # actiondeck - GitHub Actions workflows from the terminal
//!
//! actiondeck keeps a local cache of the workflows of several configured
//! GitHub repositories and lets an operator browse, enable, disable and
//! dispatch them.
//!
//! actiondeck provides:
//! - A durable workflow store: one storage actor owns the SQLite handle and
//!   applies every operation in mailbox order
//! - Typed `Repository` / `Workflow` records persisted verbatim
//! - A GitHub Actions REST client behind the `WorkflowSource` trait
//! - YAML configuration that seeds the repository table
//! - A command-line front end that talks to the store only through messages

pub mod model;
pub mod serde_utils;
pub mod storage;
pub mod github;
pub mod sync;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use model::{Repository, Workflow, WorkflowState};
pub use storage::{Message, Reply, Store, StoreOptions};
pub use github::{GithubClient, RemoteAction, WorkflowSource};

use std::time::Duration;

/// Result type alias for actiondeck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for actiondeck operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The database could not be opened or its schema could not be created.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: persistence is disabled")]
    StoreUnavailable,

    #[error("Store closed")]
    StoreClosed,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Storage error: {0}")]
    Storage(#[source] rusqlite::Error),

    #[error("Unexpected reply from storage actor: {0}")]
    UnexpectedReply(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::ConstraintViolation(message.unwrap_or_else(|| code.to_string()))
            }
            other => Error::Storage(other),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Remote(err.to_string())
    }
}
