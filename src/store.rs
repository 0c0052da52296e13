//! Credential store on top of lpass
//!
//! Every entry lives under one LastPass folder (the namespace) and is named
//! after the host of its registry URL, so `https://example.com/v2/` and
//! `example.com:443` both map to `Docker Credentials/example.com`.
//!
//! Operations validate their arguments first, then make sure the lpass
//! session is up, then talk to lpass.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use url::{Host, Url};

use crate::backend::Runner;
use crate::config::LpassConfig;
use crate::session::Session;
use crate::{HelperError, Result};

/// A registry credential
#[derive(Debug)]
pub struct Credential {
    pub server_url: String,
    pub username: String,
    pub secret: SecretString,
}

impl Credential {
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            username: username.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// Text block piped to `lpass add`/`lpass edit`
    fn field_block(&self) -> String {
        format!(
            "URL: {}\nUsername: {}\nPassword: {}\n",
            self.server_url,
            self.username,
            self.secret.expose_secret()
        )
    }
}

/// The four operations a credential helper exposes
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Username and secret stored for `server_url`
    async fn get(&self, server_url: &str) -> Result<(String, SecretString)>;

    /// Create or replace the entry for `creds.server_url`
    async fn add(&self, creds: Option<Credential>) -> Result<()>;

    /// Remove the entry for `server_url`
    async fn delete(&self, server_url: &str) -> Result<()>;

    /// Every stored server URL with its username
    async fn list(&self) -> Result<HashMap<String, String>>;
}

/// Extract the host a server URL refers to.
///
/// Bare addresses without a scheme are read as `https://`. IPv6 hosts are
/// returned without their brackets.
pub fn domain_in_url(server_url: &str) -> Result<String> {
    let parsed = if has_scheme(server_url) {
        Url::parse(server_url)
    } else {
        Url::parse(&format!("https://{server_url}"))
    }
    .map_err(|e| invalid_url(server_url, e))?;

    let host = match parsed.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    };
    if host.is_empty() {
        return Err(HelperError::InvalidArgument(format!(
            "no host in server url {server_url:?}"
        )));
    }
    Ok(host)
}

/// Whether `s` starts with `<scheme>://`; a `://` later in the path or
/// query does not count.
fn has_scheme(s: &str) -> bool {
    let Some((scheme, _)) = s.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn invalid_url(server_url: &str, err: url::ParseError) -> HelperError {
    HelperError::InvalidArgument(format!("invalid server url {server_url:?}: {err}"))
}

/// Credential store driving the lpass CLI
pub struct LastPassStore {
    runner: Arc<dyn Runner>,
    session: Arc<Session>,
    namespace: String,
    list_format: String,
}

impl LastPassStore {
    pub fn new(runner: Arc<dyn Runner>, session: Arc<Session>, config: &LpassConfig) -> Self {
        Self {
            runner,
            session,
            namespace: config.namespace.trim_matches('/').to_string(),
            list_format: config.list_format.clone(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Entry name for a server URL: `<namespace>/<host>`
    pub fn entry_path(&self, server_url: &str) -> Result<String> {
        let domain = domain_in_url(server_url)?;
        Ok(format!("{}/{}", self.namespace, domain))
    }

    /// Run lpass once the session is initialized
    async fn lpass(&self, stdin: &str, args: &[&str]) -> Result<String> {
        self.session.ensure_initialized().await?;
        Ok(self.runner.run(stdin, args).await?)
    }
}

fn require_url(server_url: &str) -> Result<()> {
    if server_url.is_empty() {
        return Err(HelperError::InvalidArgument("missing server url".to_string()));
    }
    Ok(())
}

#[async_trait]
impl CredentialStore for LastPassStore {
    async fn get(&self, server_url: &str) -> Result<(String, SecretString)> {
        require_url(server_url)?;
        let entry = self.entry_path(server_url)?;

        let username = self.lpass("", &["show", "--user", &entry]).await?;
        let secret = self.lpass("", &["show", "--pass", &entry]).await?;

        Ok((username, SecretString::from(secret)))
    }

    async fn add(&self, creds: Option<Credential>) -> Result<()> {
        let creds = creds.ok_or_else(|| HelperError::InvalidArgument("missing credentials".to_string()))?;
        require_url(&creds.server_url)?;
        let entry = self.entry_path(&creds.server_url)?;
        let details = creds.field_block();

        // Update in place when the entry exists; only a confirmed miss creates one
        let command = match self.get(&creds.server_url).await {
            Ok(_) => "edit",
            Err(HelperError::EntryNotFound { .. }) => "add",
            Err(e) => return Err(e),
        };

        tracing::debug!(entry = %entry, command, "storing credential");
        self.lpass(&details, &[command, "--non-interactive", &entry]).await?;
        Ok(())
    }

    async fn delete(&self, server_url: &str) -> Result<()> {
        require_url(server_url)?;
        let entry = self.entry_path(server_url)?;

        // TODO: lpass may only accept the numeric id here; look it up with
        // `show --id` before removing if name-based rm turns out unreliable
        self.lpass("", &["rm", &entry]).await?;
        Ok(())
    }

    async fn list(&self) -> Result<HashMap<String, String>> {
        let output = self
            .lpass("", &["ls", "--format", &self.list_format, &self.namespace])
            .await?;

        let mut resp = HashMap::new();

        for entry_id in output.lines().filter(|l| !l.trim().is_empty()) {
            let server_url = self.lpass("", &["show", "--url", entry_id]).await?;
            let username = self.lpass("", &["show", "--user", entry_id]).await?;
            resp.insert(server_url, username);
        }

        Ok(resp)
    }
}
