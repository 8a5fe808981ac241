//! Periodic TCP reachability probes against the configured servers.

use crate::metrics::Metrics;
use crate::pool::normalize_server;
use dnsres_domain::Level;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const PROBE_INTERVAL: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HealthProbe {
    servers: Vec<String>,
    status: RwLock<HashMap<String, bool>>,
    metrics: Arc<Metrics>,
    level: Level,
}

impl HealthProbe {
    pub fn new(servers: &[String], metrics: Arc<Metrics>, level: Level) -> Self {
        Self {
            servers: servers.iter().map(|s| normalize_server(s)).collect(),
            status: RwLock::new(HashMap::new()),
            metrics,
            level,
        }
    }

    /// Probe loop: one immediate pass, then every 30 seconds until the
    /// token is cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        self.probe_all().await;
        let mut interval = tokio::time::interval(PROBE_INTERVAL);
        interval.tick().await; // consume the immediate first tick
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = interval.tick() => self.probe_all().await,
            }
        }
    }

    async fn probe_all(&self) {
        for server in &self.servers {
            let name = server.as_str();
            let start = Instant::now();
            let healthy = matches!(
                tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(name)).await,
                Ok(Ok(_))
            );

            if healthy {
                self.metrics.success_queries.inc(&[name, ""]);
                self.metrics
                    .query_duration_seconds
                    .observe(&[name, ""], start.elapsed().as_secs_f64());
            } else {
                if self.level >= Level::Medium {
                    debug!(server = %name, "health check failed");
                }
                self.metrics
                    .failure_queries
                    .inc(&[name, "", "health_check"]);
            }

            if let Ok(mut status) = self.status.write() {
                status.insert(server.clone(), healthy);
            }
        }
    }

    /// True iff any probed server is currently marked healthy.
    pub fn any_healthy(&self) -> bool {
        self.status
            .read()
            .map(|status| status.values().any(|healthy| *healthy))
            .unwrap_or(false)
    }

    /// A copy of the status map; the live map is never exposed.
    pub fn snapshot(&self) -> HashMap<String, bool> {
        self.status
            .read()
            .map(|status| status.clone())
            .unwrap_or_default()
    }
}
