use crate::handlers;
use crate::state::{HealthState, MetricsState};
use axum::{routing::get, Router};
use dnsres_infrastructure::{HealthProbe, Metrics};
use std::sync::Arc;

/// Router for the liveness port: `GET /` answers with the aggregate
/// server health.
pub fn health_router(health: Arc<HealthProbe>) -> Router {
    Router::new()
        .route("/", get(handlers::health_check))
        .with_state(HealthState { health })
}

/// Router for the scrape port: `GET /metrics` serves the Prometheus
/// text exposition.
pub fn metrics_router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(handlers::render_metrics))
        .with_state(MetricsState { metrics })
}
