#![deny(clippy::mod_module_files)]
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod auth;
mod client;
mod commands;
mod config;
mod error;
mod pack;
mod protocol;
mod remote;
mod session;

use config::RelayConfig;
use pack::GitIndexPack;
use session::Session;

/// Git remote helper for `relay::` URLs
///
/// Git runs it as `git-remote-relay <remote-name> <url>` and speaks the
/// remote-helper protocol over stdin/stdout.
#[derive(Debug, Parser)]
#[command(name = "git-remote-relay", version)]
struct Cli {
    /// Log at debug level unless GIT_REMOTE_RELAY_LOG or RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Remote name and URL, e.g. `origin relay::https://host/orgs/acme/repos/infra`
    args: Vec<String>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GIT_REMOTE_RELAY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RelayConfig::load().context("Failed to load configuration")?;
    let indexer = GitIndexPack::new(config.git_binary());
    let mut session =
        Session::new(config, Box::new(indexer)).context("Failed to create HTTP client")?;

    session.observe(&cli.args);
    if session.remote().is_none() {
        tracing::debug!("no relay:: URL in arguments {:?}", cli.args);
    }

    let mut stdout = tokio::io::stdout();
    protocol::handle_commands(&mut session, tokio::io::stdin(), &mut stdout)
        .await
        .context("Remote helper protocol failed")?;

    Ok(())
}
