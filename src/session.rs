//! One-time lpass session setup
//!
//! Before the first store operation the helper checks `lpass status`. If the
//! CLI is not logged in, the user is asked for their LastPass username and
//! `lpass login` is run once. The check is serialized so concurrent first
//! callers produce a single prompt.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::backend::Runner;
use crate::HelperError;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
}

/// Source of the LastPass username used for `lpass login`
#[async_trait]
pub trait UsernamePrompt: Send + Sync {
    async fn read_username(&self) -> std::io::Result<String>;
}

/// Input shared between the request payload and the login prompt
pub type SharedInput<R> = Arc<Mutex<R>>;

/// Prompts on stderr and reads one line from a shared input.
///
/// stdout is left alone since it carries helper replies. The input is the
/// same buffered reader the request payload was read from, so lines piped
/// after the payload reach the prompt.
pub struct ReaderPrompt<R> {
    input: SharedInput<R>,
}

impl<R> ReaderPrompt<R> {
    pub fn new(input: SharedInput<R>) -> Self {
        Self { input }
    }
}

/// Prompt reading from the process's stdin
pub type StdinPrompt = ReaderPrompt<BufReader<Stdin>>;

#[async_trait]
impl<R> UsernamePrompt for ReaderPrompt<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn read_username(&self) -> std::io::Result<String> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(b"Enter your LastPass username: ").await?;
        stderr.flush().await?;

        let mut line = String::new();
        self.input.lock().await.read_line(&mut line).await?;
        Ok(line)
    }
}

/// Authenticated lpass session, established at most once
pub struct Session {
    runner: Arc<dyn Runner>,
    prompt: Arc<dyn UsernamePrompt>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(runner: Arc<dyn Runner>, prompt: Arc<dyn UsernamePrompt>) -> Self {
        Self {
            runner,
            prompt,
            state: Mutex::new(SessionState::Uninitialized),
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Make sure lpass is logged in, logging in interactively if needed.
    ///
    /// A failed attempt leaves the session uninitialized so the next call
    /// starts over.
    pub async fn ensure_initialized(&self) -> Result<(), HelperError> {
        let mut state = self.state.lock().await;
        if *state == SessionState::Initialized {
            return Ok(());
        }

        if let Err(e) = self.runner.run("", &["status", "--quiet"]).await {
            tracing::debug!(error = %e, "lpass not logged in");
            self.login().await?;
        }

        // confirm the session, whether it predates us or came from the login above
        if let Err(e) = self.runner.run("", &["status", "--quiet"]).await {
            return Err(HelperError::NotInitialized(e));
        }

        *state = SessionState::Initialized;
        tracing::debug!("lpass session initialized");
        Ok(())
    }

    async fn login(&self) -> Result<(), HelperError> {
        let username = self.prompt.read_username().await?;
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(HelperError::LoginFailed { username });
        }

        tracing::info!(username = %username, "logging into lpass");
        self.runner
            .run_interactive(&["login", &username])
            .await
            .map_err(|e| {
                tracing::warn!(username = %username, error = %e, "lpass login failed");
                HelperError::LoginFailed {
                    username: username.clone(),
                }
            })
    }
}
