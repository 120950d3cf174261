use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mangonel::{client, server, Collector, Config, Repository, Runner, Service};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::load();

    let http = client::build(&cfg.http_client)?;
    let repo = Arc::new(Repository::new());
    let collector = Arc::new(Collector::new());
    let runner = Runner::new(Arc::clone(&repo), collector, http);
    let service = Arc::new(Service::new(repo, runner.clone()));

    let app = server::router(service);
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.application.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Active runs are cancelled and their collector workers joined
    // before the process exits.
    runner.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, stopping server");
}
