use dnsres_domain::ResolveError;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

/// Maximum UDP response size with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// A reusable DNS-over-UDP client. State is just the per-query timeout;
/// sockets are ephemeral per exchange, so a failed client needs no reset.
#[derive(Debug)]
pub struct DnsClient {
    timeout: Duration,
}

impl DnsClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send a wire-format query and wait for the response.
    ///
    /// Returns the raw response bytes and the elapsed wall time. Timeouts
    /// and socket errors both surface as `ResolveError::Query`.
    pub async fn exchange(
        &self,
        query: &[u8],
        server: &str,
    ) -> Result<(Vec<u8>, Duration), ResolveError> {
        let server_addr = resolve_server_addr(server).await?;
        let bind_addr: SocketAddr = if server_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let start = Instant::now();
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ResolveError::Query(format!("failed to bind UDP socket: {e}")))?;

        tokio::time::timeout(self.timeout, socket.send_to(query, server_addr))
            .await
            .map_err(|_| ResolveError::Query(format!("timeout sending query to {server}")))?
            .map_err(|e| ResolveError::Query(format!("failed to send query to {server}: {e}")))?;

        let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        let (len, from_addr) = tokio::time::timeout(self.timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| ResolveError::Query(format!("timeout waiting for response from {server}")))?
            .map_err(|e| {
                ResolveError::Query(format!("failed to receive response from {server}: {e}"))
            })?;

        if from_addr.ip() != server_addr.ip() {
            tracing::warn!(
                expected = %server_addr,
                received_from = %from_addr,
                "UDP response from unexpected source"
            );
        }

        buf.truncate(len);
        Ok((buf, start.elapsed()))
    }
}

async fn resolve_server_addr(server: &str) -> Result<SocketAddr, ResolveError> {
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host(server)
        .await
        .map_err(|e| ResolveError::Query(format!("cannot resolve server address {server}: {e}")))?
        .next()
        .ok_or_else(|| ResolveError::Query(format!("no address found for server {server}")))
}
