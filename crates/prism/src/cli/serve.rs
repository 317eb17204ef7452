//! The `prism serve` command.

use super::AppContext;
use crate::server::{self, AppState};
use clap::Args;
use prism_core::Prism;
use std::sync::Arc;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address (defaults to server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (defaults to server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, ctx: AppContext) -> anyhow::Result<()> {
    let host = args.host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = args.port.unwrap_or(ctx.config.server.port);

    let db = ctx.open_database().await?;
    let guides = ctx.install_guides(Some(&db)).await?;
    let prism = Prism::new(ctx.config, guides)?;
    if prism.provider_keys().is_empty() {
        tracing::warn!("Serving without providers; /enrich-item will return empty results");
    }
    if prism.judge().is_none() {
        tracing::info!("No judge configured; /evaluate will answer 503");
    }

    let db = Arc::new(db);
    let app = server::router(AppState {
        prism: Arc::new(prism),
        db: db.clone(),
    });

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
