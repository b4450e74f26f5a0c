//! Plughub Server - REST API over the plugin and theme catalog.
//!
//! Fills both snapshot caches before binding, then serves them while a
//! background task refreshes them on a fixed interval.

mod handlers;
mod ratelimit;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use plughub_core::config::{RateLimitConfig, RegistryConfig};
use plughub_core::{CancellationToken, Catalog, ProviderCredentials, RateLimiter};
use server::{AppState, ServerConfig};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinError;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "plughub-server", version)]
#[command(about = "REST API for the community plugin and theme catalog")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8337)]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Deployment environment; `development` also allows localhost origins
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Bearer token for github.com
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Bearer token for codeberg.org
    #[arg(long, env = "CODEBERG_TOKEN", hide_env_values = true)]
    codeberg_token: Option<String>,

    /// Sustained requests per second allowed per client
    #[arg(long, default_value_t = RateLimitConfig::REQUESTS_PER_SECOND)]
    rate_limit_rps: f64,

    /// Requests a client may burst above the sustained rate
    #[arg(long, default_value_t = RateLimitConfig::BURST)]
    rate_limit_burst: u32,

    /// Seconds between catalog refreshes
    #[arg(
        long,
        default_value_t = RegistryConfig::REFRESH_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    refresh_interval_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(args: &Args) {
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!(
        "Starting plughub server v{} ({})",
        env!("CARGO_PKG_VERSION"),
        args.environment
    );

    let credentials = ProviderCredentials::new()
        .with_token("github.com", args.github_token.clone().unwrap_or_default())
        .with_token("codeberg.org", args.codeberg_token.clone().unwrap_or_default());
    let catalog = Catalog::builder().credentials(credentials).build();
    let cancel = CancellationToken::new();

    catalog
        .initialize(&cancel)
        .await
        .context("Initial catalog fetch failed")?;

    let limiter = Arc::new(RateLimiter::new(args.rate_limit_rps, args.rate_limit_burst));
    let sweeper = limiter.spawn_sweeper(RateLimitConfig::SWEEP_INTERVAL, cancel.clone());
    let scheduler = catalog
        .scheduler(Duration::from_secs(args.refresh_interval_secs))
        .spawn(cancel.clone());

    let state = Arc::new(AppState::new(catalog, limiter, args.environment.clone()));
    let app = server::build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", listener.local_addr()?);

    let serve = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .into_future();
    let drain_deadline = async {
        cancel.cancelled().await;
        tokio::time::sleep(ServerConfig::SHUTDOWN_GRACE).await;
    };

    tokio::select! {
        result = serve => result?,
        _ = drain_deadline => warn!(
            "Connections still open after {}s, shutting down anyway",
            ServerConfig::SHUTDOWN_GRACE.as_secs()
        ),
    }

    let (scheduler, sweeper) = tokio::join!(scheduler, sweeper);
    report_task_exit("Refresh scheduler", scheduler);
    report_task_exit("Rate-limit sweeper", sweeper);
    info!("Server stopped");
    Ok(())
}

/// Log a background task that panicked or was aborted. Returns whether it
/// exited cleanly.
fn report_task_exit(task: &str, outcome: Result<(), JoinError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            error!("{} ended abnormally: {}", task, e);
            false
        }
    }
}

/// Resolve on Ctrl-C or SIGTERM and cancel every background task.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    cancel.cancel();
}
