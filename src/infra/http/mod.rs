//! HTTP adapters: cache-header middleware for origin routers and the
//! publish webhook listener.

mod hooks;
mod middleware;

pub use hooks::HookState;
pub use middleware::{
    ARR_DISABLE_AFFINITY_HEADER, CacheHeaderState, METRIC_CACHE_DIRECTIVE_TOTAL, RequestContext,
    ResolvedContent, apply_cache_directive, cache_headers_layer, log_responses,
    set_request_context,
};

use std::net::SocketAddr;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};
use tracing::{info, warn};

use super::error::InfraError;

pub const CONTENT_PUBLISHED_PATH: &str = "/hooks/content-published";

pub fn build_router(state: HookState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(CONTENT_PUBLISHED_PATH, post(hooks::content_published))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Serve the webhook router until ctrl-c.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<(), InfraError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        target = "cachepilot::http",
        addr = %listener.local_addr()?,
        "listening for publish hooks"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(target = "cachepilot::http", "shutdown signal received"),
        Err(err) => {
            warn!(target = "cachepilot::http", error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}
