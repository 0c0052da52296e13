//! lpass-helper - credential helper backed by the LastPass CLI
//!
//! This library drives `lpass` as a subprocess to store, fetch, erase and
//! list registry credentials. Entries live in a single LastPass folder and
//! are keyed by the host of the registry URL.

pub mod backend;
pub mod config;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;

use thiserror::Error;

use backend::BackendError;

/// Main error type for helper operations
#[derive(Error, Debug)]
pub enum HelperError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    ExternalTool(BackendError),

    #[error("failed to log into `lpass`; try running `lpass login {username}` yourself")]
    LoginFailed { username: String },

    #[error("lpass not initialized: {0}")]
    NotInitialized(#[source] BackendError),

    #[error("{message}")]
    EntryNotFound { path: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<BackendError> for HelperError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound { path, message } => HelperError::EntryNotFound { path, message },
            other => HelperError::ExternalTool(other),
        }
    }
}

/// Result type alias for helper operations
pub type Result<T> = std::result::Result<T, HelperError>;
