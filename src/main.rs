// ABOUTME: Main entry point for the chatty relay
// ABOUTME: Parses flags, runs admin one-shots or connects and drives the relay session

use anyhow::{Context, Result};
use chatty::{
    admin,
    cli::{Cli, USAGE_EXIT_CODE},
    config::Config,
    logging,
    router::Router,
    storage::SqliteStore,
};
use chatty_core::IdentityStore;
use clap::{CommandFactory, Parser};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let _log_guard = logging::init(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli.apply_to(&mut config);

    tracing::debug!(config = ?config, "Configuration loaded");

    let action = cli.admin_action();
    if action.is_none() && !config.has_credentials() {
        eprintln!("usage: chatty [options]\n");
        let _ = Cli::command().print_help();
        std::process::exit(USAGE_EXIT_CODE);
    }

    let sqlite = SqliteStore::open(&config.store.path)
        .with_context(|| format!("Failed to open identity store at {}", config.store.path))?;
    let store = IdentityStore::new(Arc::new(sqlite));

    if let Some(action) = action {
        return admin::run(&store, &action);
    }

    let router = Router::load(store);

    if let Err(e) = run_session(&config, router).await {
        tracing::error!(error = %e, "Relay stopped");
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "xmpp")]
async fn run_session(config: &Config, router: Router) -> Result<()> {
    let password = config.xmpp.password.as_deref().unwrap_or_default();
    let transport =
        chatty::xmpp::XmppTransport::connect(&config.xmpp.server, &config.xmpp.username, password)
            .await?;

    chatty::session::SessionDriver::new(Arc::new(transport), router, config.presence.interval())
        .run()
        .await
}

#[cfg(not(feature = "xmpp"))]
async fn run_session(_config: &Config, _router: Router) -> Result<()> {
    anyhow::bail!("chatty was built without a transport; enable the `xmpp` feature")
}
