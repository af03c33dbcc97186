mod cli;
mod logging;

use clap::Parser;
use cli::Cli;
use ssh_relay::config::Config;
use ssh_relay::ssh::SshConnector;
use ssh_relay::{ForwardManager, RelayError, Result, SessionPool};
use std::sync::Arc;
use tracing::{error, info, instrument};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli);

    if let Err(e) = run(cli).await {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

#[instrument(name = "run", skip(cli), fields(config = %cli.config.display()))]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;

    if cli.check {
        return check(&config);
    }

    info!(
        "ssh-relay v{} - {} upstream groups, {} rules",
        env!("CARGO_PKG_VERSION"),
        config.registry.len(),
        config.rules.len()
    );
    if let Some(title) = &config.title {
        info!("Configuration: {}", title);
    }

    let registry = Arc::new(config.registry);
    let pool = Arc::new(SessionPool::new(SshConnector::new(config.ssh), registry));
    let mut manager = ForwardManager::new(pool);
    manager.start(config.rules).await;

    if manager.active_rules().is_empty() {
        return Err(RelayError::Config(
            "no forwarding rules could be started".to_string(),
        ));
    }

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, stopping");
    manager.shutdown().await;

    Ok(())
}

/// Print the rule table and report rules whose group is unknown.
fn check(config: &Config) -> Result<()> {
    let mut unknown = 0;
    for rule in &config.rules {
        let status = match config.registry.resolve(&rule.group) {
            Ok(endpoint) => format!("{}@{}", endpoint.user, endpoint.address),
            Err(_) => {
                unknown += 1;
                "unknown group".to_string()
            }
        };
        println!(
            "{:<24} {:<24} {:<12} {}",
            rule.bind.to_string(),
            rule.remote.to_string(),
            rule.group,
            status
        );
    }

    if unknown > 0 {
        return Err(RelayError::Config(format!(
            "{} rule(s) reference unknown groups",
            unknown
        )));
    }
    Ok(())
}
