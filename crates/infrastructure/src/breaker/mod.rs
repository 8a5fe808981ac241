//! Per-server circuit breaker.
//!
//! State is not stored; it is derived from `(failures, last_error_at)` and
//! the clock on every query. The mutex guards only those two fields and is
//! never held across I/O.

use crate::metrics::Metrics;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }

    /// Gauge encoding: Closed=0, Open=1, HalfOpen=2.
    pub fn code(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::Open => 1.0,
            BreakerState::HalfOpen => 2.0,
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct BreakerInner {
    failures: u32,
    last_error_at: Option<Instant>,
}

impl BreakerInner {
    fn state(&self, threshold: u32, timeout: Duration) -> BreakerState {
        if self.failures < threshold {
            return BreakerState::Closed;
        }
        match self.last_error_at {
            Some(at) if at.elapsed() < timeout => BreakerState::Open,
            _ => BreakerState::HalfOpen,
        }
    }
}

pub struct CircuitBreaker {
    threshold: u32,
    timeout: Duration,
    server: String,
    metrics: Arc<Metrics>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, timeout: Duration, server: impl Into<String>, metrics: Arc<Metrics>) -> Self {
        Self {
            threshold,
            timeout,
            server: server.into(),
            metrics,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    /// Whether a request may go out. True in `Closed` and `HalfOpen`.
    ///
    /// Publishes the derived state to the state gauge as a side effect;
    /// it is the only output of this call.
    pub fn allow(&self) -> bool {
        let state = self.state();
        self.metrics.breaker_state.set(&[self.server.as_str()], state.code());
        state != BreakerState::Open
    }

    /// A single success collapses the breaker back to `Closed`.
    pub fn record_success(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failures = 0;
        }
        self.metrics
            .breaker_state
            .set(&[self.server.as_str()], BreakerState::Closed.code());
    }

    pub fn record_failure(&self) {
        let now_open = {
            let Ok(mut inner) = self.inner.lock() else { return };
            inner.failures += 1;
            inner.last_error_at = Some(Instant::now());
            inner.state(self.threshold, self.timeout) == BreakerState::Open
        };

        self.metrics.breaker_failures_total.inc(&[self.server.as_str()]);
        if now_open {
            self.metrics
                .breaker_state
                .set(&[self.server.as_str()], BreakerState::Open.code());
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner
            .lock()
            .map(|inner| inner.state(self.threshold, self.timeout))
            .unwrap_or(BreakerState::Closed)
    }

    pub fn failures(&self) -> u32 {
        self.inner.lock().map(|inner| inner.failures).unwrap_or(0)
    }
}
