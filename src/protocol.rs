//! Credential-helper wire protocol
//!
//! The helper is invoked once per request as `<binary> <action>`. The
//! request payload arrives on stdin and the reply is written to stdout:
//! plain text for server URLs, JSON for credentials and listings. A failed
//! request prints its message on stdout and exits non-zero.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Message clients match on to tell a missing entry from other failures
pub const CREDENTIALS_NOT_FOUND: &str = "credentials not found in native keychain";

/// Helper actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Fetch credentials for a server URL
    Get,
    /// Create or update credentials
    Store,
    /// Remove credentials for a server URL
    Erase,
    /// Enumerate stored server URLs and usernames
    List,
    /// Print the helper version
    Version,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(Action::Get),
            "store" => Ok(Action::Store),
            "erase" => Ok(Action::Erase),
            "list" => Ok(Action::List),
            "version" => Ok(Action::Version),
            other => Err(format!("unknown credential action `{other}`")),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Get => "get",
            Action::Store => "store",
            Action::Erase => "erase",
            Action::List => "list",
            Action::Version => "version",
        };
        f.write_str(name)
    }
}

/// Credentials as they travel over stdin/stdout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireCredentials {
    #[serde(rename = "ServerURL")]
    pub server_url: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Secret")]
    pub secret: String,
}

/// Listing reply: server URL to username
pub type ListReply = HashMap<String, String>;

/// Outcome of one helper invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Text to print on stdout, exit 0
    Ok(String),
    /// Error message to print on stdout, exit 1
    Error(String),
}

impl Response {
    /// Create a success response with credentials
    pub fn credentials(creds: &WireCredentials) -> serde_json::Result<Self> {
        Ok(Response::Ok(serde_json::to_string(creds)?))
    }

    /// Create a success response with a listing
    pub fn list(entries: &ListReply) -> serde_json::Result<Self> {
        Ok(Response::Ok(serde_json::to_string(entries)?))
    }

    /// Create an empty success response
    pub fn ok() -> Self {
        Response::Ok(String::new())
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Text written to stdout
    pub fn body(&self) -> &str {
        match self {
            Response::Ok(body) | Response::Error(body) => body,
        }
    }
}
