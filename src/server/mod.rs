//! Request handling for the credential helper
//!
//! Decodes the payload of one helper action, dispatches it to the
//! credential store and turns the outcome into a [`Response`].

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::protocol::{Action, Response, WireCredentials, CREDENTIALS_NOT_FOUND};
use crate::store::{Credential, CredentialStore};
use crate::HelperError;

/// Helper request handler
pub struct HelperServer {
    /// Credential store backing every action
    store: Arc<dyn CredentialStore>,
}

impl HelperServer {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Read the payload `action` expects from `reader`.
    ///
    /// URL actions consume a single line, so whatever follows stays in
    /// `reader` for a [`ReaderPrompt`](crate::session::ReaderPrompt) sharing
    /// it; `store` reads its JSON document to the end.
    pub async fn read_payload<R>(action: Action, reader: &mut R) -> std::io::Result<String>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut payload = String::new();
        match action {
            Action::Get | Action::Erase => {
                reader.read_line(&mut payload).await?;
            }
            Action::Store => {
                reader.read_to_string(&mut payload).await?;
            }
            Action::List | Action::Version => {}
        }
        Ok(payload)
    }

    /// Handle a single request
    pub async fn handle(&self, action: Action, payload: &str) -> Response {
        tracing::debug!(action = %action, "handling request");

        let result = match action {
            Action::Get => self.handle_get(payload).await,
            Action::Store => self.handle_store(payload).await,
            Action::Erase => self.handle_erase(payload).await,
            Action::List => self.handle_list().await,
            Action::Version => Ok(Response::Ok(format!(
                "{} {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))),
        };

        match result {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(action = %action, error = %e, "request failed");
                let message = match (&e, action) {
                    (HelperError::EntryNotFound { .. }, Action::Get) => CREDENTIALS_NOT_FOUND.to_string(),
                    _ => e.to_string(),
                };
                Response::error(message)
            }
        }
    }

    async fn handle_get(&self, payload: &str) -> Result<Response, HelperError> {
        let server_url = payload.trim();
        let (username, secret) = self.store.get(server_url).await?;

        Ok(Response::credentials(&WireCredentials {
            server_url: server_url.to_string(),
            username,
            secret: secret.expose_secret().to_string(),
        })?)
    }

    async fn handle_store(&self, payload: &str) -> Result<Response, HelperError> {
        let wire: Option<WireCredentials> = serde_json::from_str(payload.trim())?;
        let creds = wire.map(|w| Credential::new(w.server_url, w.username, w.secret));

        self.store.add(creds).await?;

        Ok(Response::ok())
    }

    async fn handle_erase(&self, payload: &str) -> Result<Response, HelperError> {
        self.store.delete(payload.trim()).await?;

        Ok(Response::ok())
    }

    async fn handle_list(&self) -> Result<Response, HelperError> {
        let entries = self.store.list().await?;

        Ok(Response::list(&entries)?)
    }
}
