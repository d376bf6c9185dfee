use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::cli::{GlobalArgs, ServeArgs};
use crate::config::AppConfig;
use crate::routes;
use crate::state::AppState;

pub async fn execute(global: GlobalArgs, serve_args: ServeArgs) -> anyhow::Result<()> {
    //  Config
    let cfg = AppConfig::load_or_default()?;

    //  Engine context (loading weights blocks for a while)
    let context = {
        let global = global.clone();
        let model = serve_args.model.clone();
        let cfg = cfg.clone();
        tokio::task::spawn_blocking(move || super::open_context(&global, &model, &cfg)).await??
    };
    let context = Arc::new(context);

    //  Shared state
    let host = serve_args.host.clone().unwrap_or_else(|| cfg.host.clone());
    let port = serve_args.port.unwrap_or(cfg.port);
    let state = AppState::new(cfg, context.clone());

    let app = routes::router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight handlers may still hold clones; close destroys the native
    // context now and makes any late call fail cleanly.
    context.close();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
