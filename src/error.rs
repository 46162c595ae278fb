use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single browser interaction (lookup, read, click, ...).
///
/// These are caught as close to the call as possible: a missing element on
/// one card must never end a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Browser initialization failed: {0}")]
    DriverInit(String),

    #[error("Navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: SessionError,
    },

    #[error("An extraction run is already in progress")]
    RunInProgress,

    #[error("Export to {path} failed: {message}")]
    Export { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ScoutError>;

pub type SessionResult<T> = std::result::Result<T, SessionError>;
