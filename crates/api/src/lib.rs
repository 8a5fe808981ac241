pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::{health_router, metrics_router};
pub use state::{HealthState, MetricsState};
