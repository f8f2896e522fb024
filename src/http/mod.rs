//! HTTP binding for the MCP server.
//!
//! Exposes `/mcp` for JSON-RPC exchanges and `/health` for liveness probes.
//! One [`McpServer`] is shared by all requests behind an async mutex, so
//! exchanges are processed one at a time against a single session.

pub mod handlers;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::Response,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tracing::info;

use crate::mcp::server::McpServer;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// The single server session.
    pub server: Arc<Mutex<McpServer>>,
    /// Largest accepted request body in bytes.
    pub max_message_size: usize,
    /// Signalled when a client requests `shutdown`.
    pub shutdown: Arc<Notify>,
}

impl AppState {
    /// Wraps a server for sharing between handlers.
    #[must_use]
    pub fn new(server: McpServer, max_message_size: usize) -> Self {
        Self {
            server: Arc::new(Mutex::new(server)),
            max_message_size,
            shutdown: Arc::new(Notify::new()),
        }
    }
}

/// Builds the router.
///
/// Bodies up to twice the message limit are buffered so the transport can
/// answer oversized requests with a JSON-RPC error; anything larger is cut
/// off by axum.
pub fn build_app(state: AppState) -> Router {
    let body_limit = state.max_message_size.saturating_mul(2);

    Router::new()
        .route("/mcp", any(handlers::mcp_endpoint))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}

/// Serves the app until `signal` resolves or a client requests `shutdown`,
/// then performs the server's final shutdown.
///
/// # Errors
///
/// Returns an error if the listener fails.
pub async fn serve<F>(state: AppState, listener: TcpListener, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = Arc::clone(&state.shutdown);
    let server = Arc::clone(&state.server);
    let app = build_app(state);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP transport listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                () = signal => info!("termination signal received"),
                () = shutdown.notified() => info!("client requested shutdown"),
            }
        })
        .await?;

    server.lock().await.finish();
    Ok(())
}

async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;

    tracing::debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = started_at.elapsed().as_millis(),
        "request summary"
    );

    response
}
