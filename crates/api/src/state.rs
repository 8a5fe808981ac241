use dnsres_infrastructure::{HealthProbe, Metrics};
use std::sync::Arc;

#[derive(Clone)]
pub struct HealthState {
    pub health: Arc<HealthProbe>,
}

#[derive(Clone)]
pub struct MetricsState {
    pub metrics: Arc<Metrics>,
}
