//! Hosting binary for the rewriting proxy.
//!
//! Loads a TOML config, starts listening, logs pipeline failures and stops
//! accepting on SIGINT/SIGTERM.

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use rewrite_proxy::config::load_config;
use rewrite_proxy::lifecycle::signals;
use rewrite_proxy::observability::logging;
use rewrite_proxy::ProxyServer;

#[derive(Parser, Debug)]
#[command(name = "rewrite-proxy", version, about = "Rule-based rewriting HTTP proxy")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Override the configured log filter (e.g. "debug", "rewrite_proxy=trace")
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    logging::init(&config.logging)?;

    tracing::info!(
        config = %args.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "rewrite-proxy starting"
    );

    let settings = config.compile()?;
    tracing::info!(
        upstream = %settings.upstream,
        listen_prefixes = settings.listen.len(),
        query_rules = settings.query_rules.len(),
        "Configuration loaded"
    );
    for rule in settings.query_rules.iter() {
        tracing::debug!(pattern = rule.pattern(), "Query rule compiled");
    }
    if settings.query_rules.is_empty() && settings.content_rules.is_empty() {
        tracing::warn!("No rewrite rules configured, proxying without rewriting");
    }

    let server = ProxyServer::new(settings);
    let mut errors = server.subscribe_errors();
    tokio::spawn(async move {
        loop {
            match errors.recv().await {
                Ok(failure) => tracing::error!(error = %failure, "Request pipeline failed"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Pipeline error reports dropped")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    for addr in server.start().await? {
        tracing::info!(address = %addr, "Accepting connections");
    }

    signals::wait_for_termination().await?;
    server.stop();

    tracing::info!(in_flight = server.in_flight(), "rewrite-proxy stopped");
    Ok(())
}
