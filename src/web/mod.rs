#![cfg(feature = "web")]

mod handlers;
mod state;
mod templates;
mod util;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use picframe::Reconciler;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use state::AppState;

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/status", get(handlers::status))
        .route("/upload", post(handlers::upload))
        .route("/display", post(handlers::display))
        .route("/purge", post(handlers::purge))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
}

pub fn run_server(host: String, port: u16, mut panel: Reconciler) -> picframe::Result<()> {
    match panel.startup() {
        Some(name) => info!(name = %name, "Restored display"),
        None => info!("Display left untouched"),
    }

    let app = build_router(AppState::new(panel));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| std::io::Error::other(format!("bind addr parse error: {e}")))?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| std::io::Error::other(format!("tokio runtime error: {e}")))?;

    Ok(rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| std::io::Error::other(format!("bind error: {e}")))?;
        if let Ok(l) = listener.local_addr() {
            info!(address = %format!("http://{l}"), "Listening");
        }
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| std::io::Error::other(format!("server error: {e}")))
    })?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
