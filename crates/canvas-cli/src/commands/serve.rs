//! Serve command implementation.
//!
//! Runs the REST API (via canvas-api) over a JSON-file or in-memory
//! repository until ctrl-c.

use std::sync::Arc;

use anyhow::Result;
use canvas_api::create_api_router;
use canvas_ops::{CanvasOps, CanvasRepository, Config, JsonFileRepository, MemoryRepository};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Start the API server.
pub async fn execute(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    memory: bool,
) -> Result<()> {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let repo: Arc<dyn CanvasRepository> = if memory {
        warn!("Using in-memory storage; canvases are lost on shutdown");
        Arc::new(MemoryRepository::new())
    } else {
        info!(path = %config.data_dir.display(), "Using data directory");
        Arc::new(JsonFileRepository::new(&config.data_dir))
    };

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;

    let ops = CanvasOps::new(config, repo);
    ops.init_provider().await?;
    let app = create_api_router(ops);

    info!(%addr, "Business Canvas API listening");
    println!("🚀 Business Canvas API on http://{}/api", addr);
    println!("   Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for ctrl-c; stop the process to exit");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
