use crate::config::ConfigError;
use thiserror::Error;

/// Errors produced by the resolution pipeline and resolver startup.
///
/// Only `Config` and `LogSetup` are fatal; every query-path variant is
/// absorbed by the cycle after being counted, logged, and published.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to set up logging: {0}")]
    LogSetup(String),

    #[error("circuit breaker open for {server}")]
    CircuitOpen { server: String },

    #[error("failed to get client from pool: {0}")]
    ClientUnavailable(String),

    #[error("DNS query failed: {0}")]
    Query(String),

    #[error("DNS query returned error code: {0}")]
    Rcode(String),
}

impl ResolveError {
    /// The event-bus `source` tag for this failure.
    pub fn source(&self) -> &'static str {
        match self {
            ResolveError::CircuitOpen { .. } => "circuit_breaker",
            ResolveError::ClientUnavailable(_) => "client_pool",
            ResolveError::Rcode(_) => "rcode",
            _ => "query_error",
        }
    }
}
