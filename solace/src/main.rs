use anyhow::Context;
use clap::Parser;
use solace::config::{Cli, GatewayConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("solace=info,sobserve=info")),
        )
        .with_target(true)
        .init();

    info!("solace v{}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::resolve(cli, |name| std::env::var(name).ok())
        .context("invalid gateway configuration")?;
    info!(
        default_service = %config.default_service,
        window = config.window,
        providers = ?config.configured_providers(),
        "configuration loaded"
    );

    let orchestrator =
        solace::build_orchestrator(&config).context("failed to build provider registry")?;
    let app = solace::router(orchestrator);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(addr = %config.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
