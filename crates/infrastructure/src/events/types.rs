use chrono::{DateTime, Local};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    CycleStart,
    CycleComplete,
    ResolveSuccess,
    ResolveFailure,
    Inconsistent,
}

/// One resolver activity event. Fields not meaningful for the variant are
/// left at their defaults; `source` tells a subscriber which pipeline stage
/// produced the outcome (`cache`, `query`, `circuit_breaker`, `client_pool`,
/// `query_error`, `rcode`).
#[derive(Debug, Clone)]
pub struct ResolverEvent {
    pub event_type: EventType,
    pub time: DateTime<Local>,
    pub hostname: String,
    pub server: String,
    pub duration: Duration,
    pub error: String,
    pub addresses: Vec<String>,
    pub consistent: Option<bool>,
    pub hostname_count: usize,
    pub server_count: usize,
    pub source: String,
}

impl ResolverEvent {
    fn base(event_type: EventType) -> Self {
        Self {
            event_type,
            time: Local::now(),
            hostname: String::new(),
            server: String::new(),
            duration: Duration::ZERO,
            error: String::new(),
            addresses: Vec::new(),
            consistent: None,
            hostname_count: 0,
            server_count: 0,
            source: String::new(),
        }
    }

    pub fn cycle_start(hostname_count: usize, server_count: usize) -> Self {
        Self {
            hostname_count,
            server_count,
            ..Self::base(EventType::CycleStart)
        }
    }

    pub fn cycle_complete(
        duration: Duration,
        hostname_count: usize,
        server_count: usize,
    ) -> Self {
        Self {
            duration,
            hostname_count,
            server_count,
            ..Self::base(EventType::CycleComplete)
        }
    }

    pub fn resolve_success(
        hostname: &str,
        server: &str,
        duration: Duration,
        addresses: Vec<String>,
        source: &str,
    ) -> Self {
        Self {
            hostname: hostname.to_string(),
            server: server.to_string(),
            duration,
            addresses,
            source: source.to_string(),
            ..Self::base(EventType::ResolveSuccess)
        }
    }

    pub fn resolve_failure(
        hostname: &str,
        server: &str,
        duration: Duration,
        error: &str,
        source: &str,
    ) -> Self {
        Self {
            hostname: hostname.to_string(),
            server: server.to_string(),
            duration,
            error: error.to_string(),
            source: source.to_string(),
            ..Self::base(EventType::ResolveFailure)
        }
    }

    pub fn inconsistent(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            consistent: Some(false),
            ..Self::base(EventType::Inconsistent)
        }
    }
}
