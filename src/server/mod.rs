pub mod handlers;
pub mod router;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::transcribe::TranscriptionPipeline;

pub use handlers::{ErrorResponse, HealthResponse, TranscribeRequest, TranscribeResponse};
pub use router::create_router;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranscriptionPipeline>,
}

impl AppState {
    pub fn new(pipeline: TranscriptionPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Bind and serve until ctrl-c
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = bind(host, port).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, strategy = ?state.pipeline.strategy(), "Listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Bind a listener; `host` may be a hostname or a bare IPv4/IPv6 address
pub async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
