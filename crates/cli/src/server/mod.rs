//! Health and metrics HTTP servers.
//!
//! Bind failures are logged and swallowed; the resolution loop is the
//! primary duty and keeps running without the endpoints. On cancellation
//! both servers drain with a fixed 5-second budget.

use axum::Router;
use dnsres_api::{health_router, metrics_router};
use dnsres_infrastructure::DnsResolver;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);

pub fn spawn_observability_servers(resolver: &Arc<DnsResolver>, token: CancellationToken) {
    let health_addr = SocketAddr::from(([0, 0, 0, 0], resolver.config().health_port));
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], resolver.config().metrics_port));

    spawn_server(
        "health",
        health_addr,
        health_router(Arc::clone(resolver.health())),
        resolver,
        token.clone(),
    );
    spawn_server(
        "metrics",
        metrics_addr,
        metrics_router(Arc::clone(resolver.metrics())),
        resolver,
        token,
    );
}

fn spawn_server(
    name: &'static str,
    addr: SocketAddr,
    app: Router,
    resolver: &Arc<DnsResolver>,
    token: CancellationToken,
) {
    let resolver = Arc::clone(resolver);
    tokio::spawn(async move {
        if let Err(e) = serve(name, addr, app, token).await {
            error!(error = %e, server = name, "HTTP server error");
            resolver.log_app_error(&format!("{name} server error: {e}"));
        }
    });
}

async fn serve(
    name: &'static str,
    addr: SocketAddr,
    app: Router,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(server = name, %addr, "endpoint listening");

    let graceful = {
        let token = token.clone();
        async move { token.cancelled().await }
    };
    let server = axum::serve(listener, app).with_graceful_shutdown(graceful);

    let deadline = async {
        token.cancelled().await;
        tokio::time::sleep(SHUTDOWN_BUDGET).await;
    };

    tokio::select! {
        result = server => result.map_err(Into::into),
        _ = deadline => Ok(()),
    }
}
