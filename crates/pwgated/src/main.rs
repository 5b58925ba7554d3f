//! pwgated - Local proxy daemon for Powerwall-style backup gateways
//!
//! Hides the devices' cookie-based login sessions behind a plain HTTP
//! interface. With several redundant gateways configured, every request is
//! raced against all of them and the first usable answer wins.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pwgate_api::{create_router, AppState};
use pwgate_core::RequestHandler;
use pwgate_fanout::FanOut;
use pwgate_session::GatewaySession;

#[derive(Parser)]
#[command(name = "pwgated", version)]
#[command(about = "Local HTTP proxy for Powerwall backup gateways")]
struct Cli {
    /// Hostname(:port) of a gateway; repeat for redundant gateways
    #[arg(short = 'H', long = "host", required = true)]
    hosts: Vec<String>,

    /// Email address for login
    #[arg(short, long, env = "PWGATE_USERNAME")]
    username: String,

    /// Password for login
    #[arg(short, long, env = "PWGATE_PASSWORD")]
    password: String,

    /// HTTP server address
    #[arg(short, long, default_value = "localhost:8043")]
    listen: String,

    /// Timeout for logging in
    #[arg(short = 't', long, default_value = "2m", value_parser = humantime::parse_duration)]
    login_timeout: Duration,

    /// Start serving even if no gateway login succeeded
    #[arg(short, long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pwgated=info,pwgate_session=info,pwgate_fanout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    validate(&cli)?;

    let mut successes = 0usize;
    let mut handlers: Vec<Arc<dyn RequestHandler>> = Vec::new();
    for host in &cli.hosts {
        let session = GatewaySession::new(host, &cli.username, &cli.password, cli.login_timeout)
            .with_context(|| format!("invalid gateway host {host:?}"))?;

        match session.attempt_login().await {
            Ok(()) => successes += 1,
            Err(err) => {
                tracing::warn!(
                    host = %session.host(),
                    error = %err,
                    "failed to log in to the gateway (check your username/password)"
                );
            }
        }

        handlers.push(Arc::new(session));
    }

    // At least one login must have succeeded; the remaining gateways may
    // just be offline for now.
    if !cli.force && successes == 0 {
        anyhow::bail!(
            "unable to login to any of the hosts: {}",
            cli.hosts.join(", ")
        );
    }

    let state = AppState::new(Arc::new(FanOut::new(handlers)));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    tracing::info!("listening on http://{}", cli.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

fn validate(cli: &Cli) -> anyhow::Result<()> {
    if cli.hosts.iter().any(|host| host.is_empty()) {
        anyhow::bail!("host cannot be empty");
    }
    if cli.username.is_empty() {
        anyhow::bail!("username is required");
    }
    if cli.password.is_empty() {
        anyhow::bail!("password is required");
    }
    Ok(())
}
