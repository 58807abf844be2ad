//! Server setup and routing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers, state::AppState};

/// Create the API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/infer", post(handlers::handle_infer))
        .route(
            "/status",
            post(handlers::handle_status).get(handlers::handle_status),
        )
        .route("/get_generated", post(handlers::handle_get_generated))
        .route("/stop", post(handlers::handle_stop))
        .route("/health", get(handlers::handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on an already bound listener until the connection loop ends.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, create_router(state)).await
}

/// Serve until `signal` resolves, then drain connections and stop the running job.
///
/// The stop is requested as soon as the signal fires and again once the
/// connection loop has ended, so a start accepted during the drain is stopped too.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: AppState,
    signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let jobs = Arc::clone(&state.jobs);
    let on_signal = Arc::clone(&jobs);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            signal.await;
            on_signal.request_stop();
        })
        .await?;
    jobs.request_stop();
    Ok(())
}

/// Run the HTTP server until Ctrl-C.
pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    serve_with_shutdown(listener, state, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down, stopping any running job");
}
