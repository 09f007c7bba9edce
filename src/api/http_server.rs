use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use crate::metrics::PrometheusSink;
use crate::monitor::ExporterSupervisor;

#[derive(Clone)]
struct AppState {
    supervisor: Arc<ExporterSupervisor>,
    sink: Arc<PrometheusSink>,
}

pub fn router(supervisor: Arc<ExporterSupervisor>, sink: Arc<PrometheusSink>) -> Router {
    let state = AppState { supervisor, sink };
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub async fn serve(
    port: u16,
    supervisor: Arc<ExporterSupervisor>,
    sink: Arc<PrometheusSink>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http server listening");
    axum::serve(listener, router(supervisor, sink)).await?;
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.supervisor.global_health().await;
    if health.healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    // Refresh the derived health gauges so the exposition is consistent
    // with the current per-network state.
    state.supervisor.global_health().await;

    match state.sink.encode() {
        Ok(body) => Response::builder()
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
