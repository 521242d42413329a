use std::path::PathBuf;

use clap::Parser;
use gemini_studio_relay::RelayConfig;

/// Gemini Studio relay
#[derive(Debug, Parser)]
#[command(name = "gemini-studio-relay", about = "Forward image generation calls to the Gemini API")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "GEMINI_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,

    /// Log filter (`RUST_LOG` syntax)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log);

    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    }
    .apply_env_overrides()?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    gemini_studio_relay::serve(config, shutdown_signal()).await?;

    tracing::info!("relay stopped");
    Ok(())
}

fn init_tracing(log_filter: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
