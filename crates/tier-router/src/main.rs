//! tier-router - routes jobs between the fast and comprehensive backends
//!
//! `serve` (default) runs the HTTP service; `probe` prints one health report
//! and exits non-zero when nothing is reachable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use routing::{OverallStatus, TieredRouter};
use tier_router::{build_router, load_config, AppState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file (fields it omits come from ORBIT_* environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides ORBIT_LISTEN_ADDR)
    #[arg(long)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Run the HTTP service
    #[default]
    Serve,
    /// Probe every collaborator once and print the report as JSON
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref(), args.listen.as_deref())
        .context("Failed to load configuration")?;
    info!(
        fast = %config.fast_backend_url,
        comprehensive = %config.comprehensive_backend_url,
        mock_mode = config.mock_mode,
        "Tier router starting v{}",
        env!("CARGO_PKG_VERSION")
    );

    let router = TieredRouter::from_config(&config).context("Failed to build router")?;

    match args.command.unwrap_or_default() {
        Command::Probe => {
            let report = router.prober().probe().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.overall == OverallStatus::Unhealthy {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Serve => serve(router, &config.listen_addr).await,
    }
}

async fn serve(router: TieredRouter, listen_addr: &str) -> Result<()> {
    let app = build_router(AppState::new(router));
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Tier router stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
