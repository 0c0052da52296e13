//! docker-credential-lastpass - credential helper backed by lpass
//!
//! Usage:
//!   docker-credential-lastpass [OPTIONS] <ACTION>
//!
//! Actions: get, store, erase, list, version. The request payload is read
//! from stdin and the reply is written to stdout.
//!
//! Options:
//!   -c, --config <PATH>     Path to config file
//!   --namespace <FOLDER>    LastPass folder holding the credentials
//!   -v, --verbose           Increase log verbosity

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lpass_helper::backend::LpassRunner;
use lpass_helper::config::Config;
use lpass_helper::protocol::Action;
use lpass_helper::server::HelperServer;
use lpass_helper::session::{Session, StdinPrompt};
use lpass_helper::store::LastPassStore;

#[derive(Parser, Debug)]
#[command(name = "docker-credential-lastpass")]
#[command(author, version, about = "Credential helper backed by the LastPass CLI", long_about = None)]
struct Args {
    /// Helper action: get, store, erase, list or version
    action: Action,

    /// Path to configuration file
    #[arg(short, long, env = "LPASS_HELPER_CONFIG")]
    config: Option<PathBuf>,

    /// LastPass folder holding the credentials
    #[arg(long, env = "LASTPASS_FOLDER")]
    namespace: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries helper replies, so logs go to stderr
    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lpass_helper={log_level},warn")));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = Config::load(args.config.as_deref())?.with_namespace(args.namespace)?;

    tracing::debug!(config = ?config, action = %args.action, "starting");

    let runner = Arc::new(LpassRunner::new(&config.lpass));
    // one buffered stdin shared by the payload and the login prompt
    let stdin = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin())));
    let session = Arc::new(Session::new(runner.clone(), Arc::new(StdinPrompt::new(stdin.clone()))));
    let store = Arc::new(LastPassStore::new(runner, session, &config.lpass));
    let server = HelperServer::new(store);

    let payload = {
        let mut input = stdin.lock().await;
        HelperServer::read_payload(args.action, &mut *input).await?
    };

    let response = server.handle(args.action, &payload).await;

    if !response.body().is_empty() {
        println!("{}", response.body());
    }

    if response.is_error() {
        std::process::exit(1);
    }

    Ok(())
}
