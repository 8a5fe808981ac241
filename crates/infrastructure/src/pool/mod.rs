//! Reusable DNS client pool, one stack of idle clients per server.

mod client;

pub use client::DnsClient;

use crate::metrics::Metrics;
use dnsres_domain::{PoolProtocol, ResolveError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct ClientPool {
    clients: Mutex<HashMap<String, Vec<DnsClient>>>,
    max_size: usize,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

/// Append `:53` when the server string carries no port.
pub fn normalize_server(server: &str) -> String {
    if server.contains(':') {
        server.to_string()
    } else {
        format!("{server}:53")
    }
}

impl ClientPool {
    pub fn new(max_size: usize, timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_size,
            timeout,
            metrics,
        }
    }

    /// Pop an idle client for the server, or build a fresh one.
    ///
    /// The returned protocol label records which of the two happened.
    pub fn get(&self, server: &str) -> Result<(DnsClient, PoolProtocol), ResolveError> {
        let server = normalize_server(server);
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| ResolveError::ClientUnavailable("client pool poisoned".into()))?;

        if let Some(client) = clients.get_mut(&server).and_then(Vec::pop) {
            self.metrics
                .pool_protocol_total
                .inc(&[server.as_str(), PoolProtocol::Pooled.as_str()]);
            return Ok((client, PoolProtocol::Pooled));
        }

        self.metrics
            .pool_protocol_total
            .inc(&[server.as_str(), PoolProtocol::New.as_str()]);
        Ok((DnsClient::new(self.timeout), PoolProtocol::New))
    }

    /// Return a client, dropping it when the server's stack is full.
    pub fn put(&self, server: &str, mut client: DnsClient) {
        let server = normalize_server(server);
        let Ok(mut clients) = self.clients.lock() else { return };

        client.set_timeout(self.timeout);

        let stack = clients.entry(server.clone()).or_default();
        if stack.len() < self.max_size {
            stack.push(client);
            self.metrics
                .pool_protocol_total
                .inc(&[server.as_str(), PoolProtocol::Returned.as_str()]);
        } else {
            self.metrics
                .pool_protocol_total
                .inc(&[server.as_str(), PoolProtocol::Dropped.as_str()]);
        }
    }

    pub fn idle_clients(&self) -> usize {
        self.clients
            .lock()
            .map(|clients| clients.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}
