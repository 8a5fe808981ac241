use crate::state::{HealthState, MetricsState};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use tracing::debug;

/// 200 "healthy" when any probed server is reachable, 503 otherwise.
pub async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    if state.health.any_healthy() {
        (StatusCode::OK, "healthy")
    } else {
        debug!("no healthy DNS servers");
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    }
}

/// Prometheus text exposition of the whole registry.
pub async fn render_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
