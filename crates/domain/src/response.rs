use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// How the client used for a query moved through the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolProtocol {
    Pooled,
    #[default]
    New,
    Returned,
    Dropped,
}

impl PoolProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolProtocol::Pooled => "pooled",
            PoolProtocol::New => "new",
            PoolProtocol::Returned => "returned",
            PoolProtocol::Dropped => "dropped",
        }
    }
}

impl fmt::Display for PoolProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successful resolution, as decoded from the wire.
///
/// Address order is whatever the server returned; it carries no meaning.
/// `ttl` is the minimum TTL across answer records (0 for an empty answer).
#[derive(Debug, Clone, Default)]
pub struct DnsResponse {
    pub server: String,
    pub hostname: String,
    pub addresses: Vec<String>,
    pub ttl: u32,
    pub record_count: HashMap<String, u32>,
    pub size: usize,
    pub dnssec: bool,
    pub edns: bool,
    pub protocol: PoolProtocol,
    pub duration: Duration,
}
