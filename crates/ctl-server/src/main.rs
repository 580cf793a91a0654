//! # ctldap
//!
//! Entry point of the directory bridge.

#![forbid(unsafe_code)]

use clap::Parser;
use ctl_core::AppConfig;
use ctl_server::{Bridge, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load(&cli.config)?;
    tracing::info!(config = %cli.config.display(), sites = config.sites.len(), "ctldap starting");

    let bridge = Bridge::from_config(config)?;
    bridge.init_sites();

    if cli.once {
        let mut failed = 0;
        for (site, outcome) in bridge.sync_all().await {
            if outcome.is_err() {
                failed += 1;
            }
            ctl_server::sync::log_outcome(&site, outcome);
        }
        anyhow::ensure!(failed == 0, "{failed} site(s) failed to sync");
        return Ok(());
    }

    bridge.run(shutdown_signal()).await;
    Ok(())
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
