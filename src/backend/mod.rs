//! Process runner for the `lpass` command-line tool
//!
//! Everything the helper knows about LastPass goes through the [`Runner`]
//! trait. Production code uses [`LpassRunner`], which spawns the real binary;
//! tests use an in-memory fake that speaks the same argument vocabulary.

mod lpass;

pub use lpass::LpassRunner;

use async_trait::async_trait;
use thiserror::Error;

/// Marker lpass prints on stderr when an entry lookup misses
pub(crate) const NOT_FOUND_MARKER: &str = "Could not find specified account";

/// Errors that can occur while running lpass
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{message}")]
    NotFound { path: String, message: String },

    #[error("lpass {command} failed: {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("lpass timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("failed to run lpass: {0}")]
    Io(#[from] std::io::Error),
}

/// Port to the external password-manager tool
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run lpass with `args`, feeding `stdin` to it.
    ///
    /// Returns stdout with one trailing newline removed.
    async fn run(&self, stdin: &str, args: &[&str]) -> Result<String, BackendError>;

    /// Run lpass attached to the caller's terminal, for commands that may
    /// prompt the user themselves (`login`).
    async fn run_interactive(&self, args: &[&str]) -> Result<(), BackendError>;
}

/// Classify a failed invocation from its stderr text.
pub(crate) fn classify_failure(args: &[&str], status: String, stderr: &str) -> BackendError {
    let stderr = stderr.trim();
    if stderr.contains(NOT_FOUND_MARKER) {
        BackendError::NotFound {
            path: args.last().unwrap_or(&"unknown").to_string(),
            message: stderr.to_string(),
        }
    } else {
        BackendError::CommandFailed {
            command: args.first().unwrap_or(&"").to_string(),
            status,
            stderr: stderr.to_string(),
        }
    }
}

#[cfg(test)]
pub mod mock {
    //! Scripted stand-in for lpass.
    //!
    //! Keeps entries in memory, assigns numeric ids the way lpass does and
    //! records every argument vector it receives.

    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default)]
    pub struct FakeEntry {
        pub id: u64,
        pub name: String,
        pub url: String,
        pub username: String,
        pub password: String,
    }

    #[derive(Default)]
    struct State {
        logged_in: bool,
        next_id: u64,
        entries: BTreeMap<u64, FakeEntry>,
        calls: Vec<Vec<String>>,
        /// Queued failures, matched by exact argument vector
        failures: VecDeque<(Vec<String>, String)>,
        login_succeeds: bool,
    }

    /// In-memory lpass fake
    pub struct FakeLpass {
        state: Mutex<State>,
    }

    impl FakeLpass {
        /// A fake that is already logged in
        pub fn new() -> Self {
            Self {
                state: Mutex::new(State {
                    logged_in: true,
                    next_id: 1000,
                    login_succeeds: true,
                    ..Default::default()
                }),
            }
        }

        /// A fake whose `status` fails until `login` is run
        pub fn logged_out(login_succeeds: bool) -> Self {
            let fake = Self::new();
            {
                let mut state = fake.state.lock().unwrap();
                state.logged_in = false;
                state.login_succeeds = login_succeeds;
            }
            fake
        }

        /// Insert an entry directly, bypassing the add command
        pub fn seed(&self, name: &str, url: &str, username: &str, password: &str) -> u64 {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            state.entries.insert(
                id,
                FakeEntry {
                    id,
                    name: name.to_string(),
                    url: url.to_string(),
                    username: username.to_string(),
                    password: password.to_string(),
                },
            );
            id
        }

        /// Make the next invocation with exactly `args` fail with `stderr`
        pub fn fail_next(&self, args: &[&str], stderr: &str) {
            let mut state = self.state.lock().unwrap();
            state
                .failures
                .push_back((args.iter().map(|a| a.to_string()).collect(), stderr.to_string()));
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.state.lock().unwrap().calls.clone()
        }

        /// Number of recorded invocations whose first argument is `command`
        pub fn count(&self, command: &str) -> usize {
            self.state
                .lock()
                .unwrap()
                .calls
                .iter()
                .filter(|c| c.first().map(String::as_str) == Some(command))
                .count()
        }

        pub fn entries(&self) -> Vec<FakeEntry> {
            self.state.lock().unwrap().entries.values().cloned().collect()
        }

        fn fail(args: &[&str], stderr: &str) -> BackendError {
            classify_failure(args, "exit status: 1".to_string(), stderr)
        }

        fn not_found(args: &[&str]) -> BackendError {
            Self::fail(args, "Error: Could not find specified account(s).")
        }

        fn find(state: &State, key: &str) -> Option<u64> {
            if let Ok(id) = key.parse::<u64>() {
                if state.entries.contains_key(&id) {
                    return Some(id);
                }
            }
            state
                .entries
                .values()
                .find(|e| e.name == key)
                .map(|e| e.id)
        }

        fn parse_block(stdin: &str) -> (String, String, String) {
            let mut url = String::new();
            let mut username = String::new();
            let mut password = String::new();
            for line in stdin.lines() {
                if let Some(v) = line.strip_prefix("URL: ") {
                    url = v.to_string();
                } else if let Some(v) = line.strip_prefix("Username: ") {
                    username = v.to_string();
                } else if let Some(v) = line.strip_prefix("Password: ") {
                    password = v.to_string();
                }
            }
            (url, username, password)
        }
    }

    #[async_trait]
    impl Runner for FakeLpass {
        async fn run(&self, stdin: &str, args: &[&str]) -> Result<String, BackendError> {
            let mut state = self.state.lock().unwrap();
            let owned: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            state.calls.push(owned.clone());

            if let Some(pos) = state.failures.iter().position(|(a, _)| *a == owned) {
                let (_, stderr) = state.failures.remove(pos).unwrap();
                return Err(Self::fail(args, &stderr));
            }

            match args {
                ["status", "--quiet"] => {
                    if state.logged_in {
                        Ok(String::new())
                    } else {
                        Err(Self::fail(args, "Not logged in."))
                    }
                }
                ["show", field, key] => {
                    let id = Self::find(&state, key).ok_or_else(|| Self::not_found(args))?;
                    let entry = &state.entries[&id];
                    match *field {
                        "--user" => Ok(entry.username.clone()),
                        "--pass" => Ok(entry.password.clone()),
                        "--url" => Ok(entry.url.clone()),
                        other => Err(Self::fail(args, &format!("unknown field {other}"))),
                    }
                }
                ["add", "--non-interactive", name] => {
                    let (url, username, password) = Self::parse_block(stdin);
                    let id = state.next_id;
                    state.next_id += 1;
                    state.entries.insert(
                        id,
                        FakeEntry {
                            id,
                            name: name.to_string(),
                            url,
                            username,
                            password,
                        },
                    );
                    Ok(String::new())
                }
                ["edit", "--non-interactive", key] => {
                    let id = Self::find(&state, key).ok_or_else(|| Self::not_found(args))?;
                    let (url, username, password) = Self::parse_block(stdin);
                    let entry = state.entries.get_mut(&id).unwrap();
                    entry.url = url;
                    entry.username = username;
                    entry.password = password;
                    Ok(String::new())
                }
                ["rm", key] => {
                    let id = Self::find(&state, key).ok_or_else(|| Self::not_found(args))?;
                    state.entries.remove(&id);
                    Ok(String::new())
                }
                ["ls", "--format", "%ai", folder] => {
                    let prefix = format!("{folder}/");
                    let ids: Vec<String> = state
                        .entries
                        .values()
                        .filter(|e| e.name.starts_with(&prefix))
                        .map(|e| e.id.to_string())
                        .collect();
                    Ok(ids.join("\n"))
                }
                _ => Err(Self::fail(args, "unsupported command")),
            }
        }

        async fn run_interactive(&self, args: &[&str]) -> Result<(), BackendError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(args.iter().map(|a| a.to_string()).collect());
            match args {
                ["login", _] if state.login_succeeds => {
                    state.logged_in = true;
                    Ok(())
                }
                _ => Err(Self::fail(args, "Error: Failed to authenticate.")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = classify_failure(
            &["show", "--user", "Docker Credentials/example.com"],
            "exit status: 1".to_string(),
            "Error: Could not find specified account(s).\n",
        );
        match err {
            BackendError::NotFound { path, message } => {
                assert_eq!(path, "Docker Credentials/example.com");
                assert_eq!(message, "Error: Could not find specified account(s).");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_other_failures_keep_stderr() {
        let err = classify_failure(&["status", "--quiet"], "exit status: 1".to_string(), "Not logged in.");
        assert!(matches!(err, BackendError::CommandFailed { .. }));
        let msg = err.to_string();
        assert!(msg.contains("status"));
        assert!(msg.contains("exit status: 1"));
        assert!(msg.contains("Not logged in."));
    }
}
